/// Challenge-interstitial signatures, matched case-insensitively against the
/// response body. A page that merely references a vendor asset host
/// (e.g. cdnjs.cloudflare.com) must not match.
const CHALLENGE_SIGNATURES: [&str; 6] = [
    "attention required",
    "just a moment",
    "checking your browser",
    "please verify you are a human",
    "cf-error",
    "captcha",
];

pub fn is_challenge_page(body: &str) -> bool {
    let body_lower = body.to_lowercase();
    CHALLENGE_SIGNATURES
        .iter()
        .any(|signature| body_lower.contains(signature))
}
