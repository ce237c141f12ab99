//! Example: Verify the attestations of an artifact
//!
//! # Usage
//!
//! Verify against attestations fetched from the forge:
//! ```sh
//! GH_TOKEN=... cargo run -p attest-verify --example verify_attestation -- \
//!     --owner octo-org dist/app.tar.gz
//! ```
//!
//! Verify against a downloaded bundle file:
//! ```sh
//! cargo run -p attest-verify --example verify_attestation -- \
//!     --repo octo-org/octo-repo --bundle app.jsonl dist/app.tar.gz
//! ```
//!
//! Verify a container image with bundles stored next to it in the registry:
//! ```sh
//! cargo run -p attest-verify --example verify_attestation -- \
//!     --owner octo-org --bundle-from-oci oci://ghcr.io/octo-org/app:latest
//! ```

use attest_api::{ClientConfig, FetchParams, LiveClient};
use attest_trust_root::TrustRootSource;
use attest_types::{DigestAlgorithm, DigestedArtifact};
use attest_verify::{
    digest_image, is_image_reference, AttestationSource, OciRegistryClient, VerificationPipeline,
    VerificationPolicy, VerificationRequest,
};
use tracing_subscriber::EnvFilter;

use std::env;
use std::path::PathBuf;
use std::process;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    let mut owner: Option<String> = None;
    let mut repo: Option<String> = None;
    let mut bundle: Option<PathBuf> = None;
    let mut bundle_from_oci = false;
    let mut predicate_type: Option<String> = None;
    let mut trusted_root: Option<PathBuf> = None;
    let mut host = "github.com".to_string();
    let mut positional: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--owner" | "-o" => owner = Some(value(&args, &mut i)),
            "--repo" | "-R" => repo = Some(value(&args, &mut i)),
            "--bundle" | "-b" => bundle = Some(PathBuf::from(value(&args, &mut i))),
            "--bundle-from-oci" => bundle_from_oci = true,
            "--predicate-type" => predicate_type = Some(value(&args, &mut i)),
            "--custom-trusted-root" => trusted_root = Some(PathBuf::from(value(&args, &mut i))),
            "--hostname" => host = value(&args, &mut i),
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            arg if !arg.starts_with('-') => positional.push(arg.to_string()),
            unknown => {
                eprintln!("Error: Unknown option: {}", unknown);
                print_usage(&args[0]);
                process::exit(1);
            }
        }
        i += 1;
    }

    if positional.len() != 1 {
        eprintln!("Error: Expected exactly one artifact");
        print_usage(&args[0]);
        process::exit(1);
    }
    let policy = match (&owner, &repo) {
        (Some(_), Some(_)) | (None, None) => {
            eprintln!("Error: Specify exactly one of --owner or --repo");
            process::exit(1);
        }
        (Some(owner), None) => VerificationPolicy::for_owner(&host, owner),
        (None, Some(repo)) => VerificationPolicy::for_repository(&host, repo),
    };
    if bundle.is_some() && bundle_from_oci {
        eprintln!("Error: --bundle and --bundle-from-oci are mutually exclusive");
        process::exit(1);
    }

    let mut config = ClientConfig::default().with_host(&host);
    if let Ok(token) = env::var("GH_TOKEN").or_else(|_| env::var("GITHUB_TOKEN")) {
        config = config.with_token(token);
    }
    let client = match LiveClient::from_config(&config) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error creating API client: {}", e);
            process::exit(1);
        }
    };
    let registry = OciRegistryClient::default();

    let artifact_path = &positional[0];
    let artifact = if is_image_reference(artifact_path) {
        digest_image(&registry, artifact_path).await
    } else {
        DigestedArtifact::from_path(artifact_path, DigestAlgorithm::Sha256)
            .map_err(attest_verify::Error::from)
    };
    let artifact = match artifact {
        Ok(artifact) => artifact,
        Err(e) => {
            eprintln!("Error digesting artifact '{}': {}", artifact_path, e);
            process::exit(1);
        }
    };

    let source = if let Some(path) = bundle {
        AttestationSource::LocalBundle(path)
    } else if bundle_from_oci {
        AttestationSource::Oci
    } else {
        let params = FetchParams::new(artifact.digest_with_alg());
        AttestationSource::Api(match (owner, repo) {
            (_, Some(repo)) => params.with_repo(repo),
            (Some(owner), None) => params.with_owner(owner),
            (None, None) => params,
        })
    };

    let trust_root = match trusted_root {
        Some(path) => TrustRootSource::File(path),
        None => TrustRootSource::default(),
    };

    let mut request = VerificationRequest::new(artifact, source).with_policy(policy);
    if let Some(predicate_type) = predicate_type {
        request = request.with_predicate_type(predicate_type);
    }

    println!("Verifying attestations...");
    println!("  Artifact: {}", request.artifact.name_ref());
    println!("  Digest: {}", request.artifact.digest_with_alg());
    println!("  Predicate Type: {}", request.predicate_type);

    let pipeline = VerificationPipeline::new(client, registry, trust_root);
    match pipeline.run_verification(&request).await {
        Ok(results) => {
            println!("\nVerification: SUCCESS");
            for result in &results {
                if let Some(san) = &result.signer.san {
                    println!("  Signer: {}", san);
                }
                if let Some(issuer) = &result.signer.issuer {
                    println!("  Issuer: {}", issuer);
                }
                if let Some(repo) = &result.signer.source_repository_uri {
                    println!("  Source Repository: {}", repo);
                }
                println!("  Verified at: {}", result.validation_time);
            }
        }
        Err(e) => {
            eprintln!("\nVerification error: {}", e);
            process::exit(if e.is_usage_error() { 2 } else { 1 });
        }
    }
}

fn value(args: &[String], i: &mut usize) -> String {
    let flag = &args[*i];
    *i += 1;
    if *i >= args.len() {
        eprintln!("Error: {} requires a value", flag);
        process::exit(1);
    }
    args[*i].clone()
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [OPTIONS] <ARTIFACT>", program);
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <ARTIFACT>    Path to the artifact, or oci://<image> for a container image");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -o, --owner <OWNER>              Require a signer workflow owned by OWNER");
    eprintln!("  -R, --repo <OWNER/REPO>          Require a signer workflow in OWNER/REPO");
    eprintln!("  -b, --bundle <PATH>              Read attestations from a .json or .jsonl file");
    eprintln!("      --bundle-from-oci            Read attestations from the image's registry");
    eprintln!("      --predicate-type <URI>       Predicate type to verify (default: SLSA v1)");
    eprintln!("      --custom-trusted-root <PATH> Trusted root JSON to use instead of TUF");
    eprintln!("      --hostname <HOST>            Forge host (default: github.com)");
    eprintln!("  -h, --help                       Print this help message");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  GH_TOKEN         Token used for the attestation API");
    eprintln!("  ATTEST_TUF_ROOT  Pinned root.json of the forge's TUF repository");
    eprintln!("  RUST_LOG         Log filter, e.g. attest_verify=debug");
}
