use std::time::Duration;

use tracing_subscriber::EnvFilter;
use url_sign::request::OwnedRequest;
use url_sign::{SignOptions, SignerConfig, UrlSigner, VerifyOptions};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    let signer = UrlSigner::new(SignerConfig::new("hidden")).expect("Failed to build signer");
    let signed = signer
        .sign(
            "https://www.example.com/downloads/report.pdf?user=42",
            &SignOptions::new().method("get").ttl(Duration::from_secs(600)),
        )
        .expect("Failed to sign");
    println!("signed:   {}", signed);
    println!("verified: {}", signer.verify(&signed, &VerifyOptions::new().method("get")));

    let original_url = signed.trim_start_matches("https://www.example.com").to_string();
    let request = OwnedRequest::new("POST", "https", Some("www.example.com".to_string()), original_url);
    signer.middleware(&request, |error| match error {
        None => println!("request:  accepted"),
        Some(error) => println!("request:  rejected ({})", error),
    });
}
