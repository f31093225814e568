use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{WrapErr, eyre};
use saml_idp::{
    config::Config,
    crypto::fingerprint_cert,
    dsig::{DigestAlgorithm, SignaturePlacement},
    saml::{TrustAnchor, is_signature_valid, sign_root_element},
    telemetry,
    xml::XmlDocument,
};

#[derive(Parser)]
#[command(name = "saml-idp", about = "Sign and verify SAML 2.0 documents", version)]
struct Cli {
    /// Debug logging for this crate
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign the root element of a SAML document
    Sign {
        /// Input XML file
        file: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Private key (PEM or DER), overrides the configured one
        #[arg(short = 'k', long)]
        key: Option<PathBuf>,

        /// Signing certificate (PEM or DER), overrides the configured one
        #[arg(long)]
        cert: Option<PathBuf>,

        /// Signature algorithm name or URI, e.g. rsa-sha256
        #[arg(long)]
        signature_algorithm: Option<String>,

        /// Digest algorithm name or URI, e.g. sha256
        #[arg(long)]
        digest_algorithm: Option<String>,

        /// XPath of the element the signature is inserted after
        #[arg(long)]
        placement: Option<String>,

        /// Namespace binding for the placement XPath (PREFIX=URI)
        #[arg(long = "ns", requires = "placement")]
        namespaces: Vec<String>,
    },

    /// Check a document's signature against a trust anchor
    Verify {
        /// Input XML file
        file: PathBuf,

        /// Expected certificate fingerprint (SHA-1 or SHA-256, any notation)
        #[arg(long, required_unless_present = "cert", conflicts_with = "cert")]
        fingerprint: Option<String>,

        /// Trusted certificate (PEM or DER)
        #[arg(long)]
        cert: Option<PathBuf>,
    },

    /// Print the fingerprint of a certificate
    Fingerprint {
        /// Certificate file (PEM or DER)
        cert: PathBuf,

        /// Digest algorithm
        #[arg(short, long, default_value = "sha256")]
        digest: String,
    },
}

fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    telemetry::init_tracing(cli.verbose);

    match cli.command {
        Commands::Sign {
            file,
            output,
            key,
            cert,
            signature_algorithm,
            digest_algorithm,
            placement,
            namespaces,
        } => {
            let mut signing = Config::load()?.signing;
            if let Some(key) = key {
                signing.private_key = None;
                signing.private_key_path = Some(key);
            }
            if let Some(cert) = cert {
                signing.certificate = None;
                signing.certificate_path = Some(cert);
            }
            if let Some(algorithm) = signature_algorithm {
                signing.signature_algorithm = algorithm;
            }
            if let Some(algorithm) = digest_algorithm {
                signing.digest_algorithm = algorithm;
            }
            let options = signing.signature_options()?;
            let placement = placement
                .map(|xpath| parse_placement(xpath, &namespaces))
                .transpose()?;

            let doc = read_document(&file)?;
            let signed = sign_root_element(&doc, &options, placement.as_ref())?;
            tracing::info!("Signed {}", file.display());

            match output {
                Some(path) => fs::write(&path, signed.to_xml())
                    .wrap_err_with(|| format!("Failed to write {}", path.display()))?,
                None => writeln!(std::io::stdout(), "{}", signed.to_xml())?,
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Verify {
            file,
            fingerprint,
            cert,
        } => {
            let anchor = match (fingerprint, cert) {
                (Some(fingerprint), _) => TrustAnchor::detect(fingerprint),
                (None, Some(path)) => TrustAnchor::Certificate(read_file(&path)?),
                (None, None) => return Err(eyre!("Either --fingerprint or --cert is required")),
            };
            let doc = read_document(&file)?;

            if is_signature_valid(&doc, &anchor)? {
                println!("valid");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("invalid");
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Fingerprint { cert, digest } => {
            let hash_alg = digest.parse::<DigestAlgorithm>()?.hash_alg();
            println!("{}", fingerprint_cert(read_file(&cert)?, hash_alg)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn parse_placement(xpath: String, namespaces: &[String]) -> color_eyre::Result<SignaturePlacement> {
    namespaces
        .iter()
        .try_fold(SignaturePlacement::new(xpath), |placement, binding| {
            let (prefix, uri) = binding
                .split_once('=')
                .ok_or_else(|| eyre!("Namespace binding must be PREFIX=URI: {binding}"))?;
            Ok(placement.with_namespace(prefix, uri))
        })
}

fn read_file(path: &Path) -> color_eyre::Result<Vec<u8>> {
    fs::read(path).wrap_err_with(|| format!("Failed to read {}", path.display()))
}

fn read_document(path: &Path) -> color_eyre::Result<XmlDocument> {
    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
    Ok(XmlDocument::parse(text)?)
}
