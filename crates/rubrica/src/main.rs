#![forbid(unsafe_code)]

//! Rubrica CLI — verify XML digital signatures.

use clap::{Parser, Subcommand};
use rubrica_dsig::{Stage, VerificationResult};
use rubrica_xml::XmlDocument;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(
    name = "rubrica",
    about = "Rubrica — XML digital signature verification",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify the signature embedded in an XML document
    ///
    /// Exit code 0 means the signature is valid, 1 means verification
    /// failed, 2 means the file could not be read.
    Verify {
        /// Input XML file
        file: PathBuf,

        /// Register additional ID attribute names
        #[arg(long = "id-attr")]
        id_attr: Vec<String>,

        /// Print the failing pipeline stage to stderr
        #[arg(short, long)]
        verbose: bool,
    },

    /// List supported algorithms
    Info,
}

fn main() {
    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Verify {
            file,
            id_attr,
            verbose,
        } => cmd_verify(&file, &id_attr, verbose),
        Commands::Info => cmd_info(),
    };
    process::exit(code);
}

fn cmd_verify(file: &PathBuf, id_attr: &[String], verbose: bool) -> i32 {
    let data = match std::fs::read(file) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("error: {}: {e}", file.display());
            return 2;
        }
    };

    let result = if id_attr.is_empty() {
        rubrica_dsig::verify_document(&data)
    } else {
        match XmlDocument::parse_bytes(&data) {
            Ok(mut doc) => {
                for attr in id_attr {
                    doc.add_id_attr(attr);
                }
                rubrica_dsig::verify(&doc)
            }
            Err(e) => VerificationResult::Invalid {
                stage: Stage::Parse,
                reason: e,
            },
        }
    };

    match result {
        VerificationResult::Valid => {
            println!("OK");
            0
        }
        VerificationResult::Invalid { stage, reason } => {
            if verbose {
                eprintln!("stage: {stage}");
            }
            eprintln!("INVALID: {reason}");
            1
        }
    }
}

fn cmd_info() -> i32 {
    println!("Rubrica — XML digital signature verification");
    println!();
    println!("Digest algorithms:");
    println!("  SHA-256, SHA-384, SHA-512");
    println!("  SHA-1 (only with the legacy-algorithms feature)");
    println!();
    println!("Signature algorithms:");
    println!("  RSA PKCS#1 v1.5 (SHA-256, SHA-384, SHA-512)");
    println!("  RSA-PSS (SHA-256, SHA-384, SHA-512)");
    println!("  ECDSA P-256 (SHA-256), ECDSA P-384 (SHA-384)");
    println!("  RSA-SHA1 (only with the legacy-algorithms feature)");
    println!();
    println!("Canonicalization:");
    println!("  C14N 1.0 (±comments)");
    println!("  Exclusive C14N 1.0 (±comments)");
    println!();
    println!("Transforms:");
    println!("  enveloped-signature, the C14N variants above");
    println!();
    println!("Key material:");
    println!("  X.509 certificate embedded in KeyInfo (RSA, EC P-256/P-384)");
    0
}
