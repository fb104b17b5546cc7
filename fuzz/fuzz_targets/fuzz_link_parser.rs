#![no_main]

use libfuzzer_sys::fuzz_target;
use prb_core::PullRequestRef;

fuzz_target!(|data: &[u8]| {
    let Ok(href) = std::str::from_utf8(data) else {
        return;
    };
    let parsed = PullRequestRef::parse(href);
    if let Some(endpoint) = parsed.endpoint() {
        assert!(endpoint.path().ends_with("/merge"));
    }
});
