#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use prb_core::PullRequestRef;

#[derive(Arbitrary, Debug)]
enum Segment {
    Projects,
    Users,
    Repos,
    PullRequests,
    Overview,
    Word(String),
    Id(u64),
    Raw(Vec<u8>),
}

impl Segment {
    fn push_to(&self, out: &mut String) {
        out.push('/');
        match self {
            Segment::Projects => out.push_str("projects"),
            Segment::Users => out.push_str("users"),
            Segment::Repos => out.push_str("repos"),
            Segment::PullRequests => out.push_str("pull-requests"),
            Segment::Overview => out.push_str("overview"),
            Segment::Word(word) => out.push_str(word),
            Segment::Id(id) => out.push_str(&id.to_string()),
            Segment::Raw(bytes) => out.push_str(&String::from_utf8_lossy(bytes)),
        }
    }
}

fuzz_target!(|input: Vec<Segment>| {
    let mut href = String::new();
    for segment in input.iter().take(32) {
        segment.push_to(&mut href);
    }
    let parsed = PullRequestRef::parse(&href);
    match (&parsed, parsed.endpoint()) {
        (PullRequestRef::Unrecognized { .. }, endpoint) => assert!(endpoint.is_none()),
        (PullRequestRef::Personal { user, .. }, Some(endpoint)) => {
            assert!(endpoint.path().contains(&format!("/projects/~{user}/")));
        }
        (PullRequestRef::Team { .. }, Some(endpoint)) => {
            assert!(endpoint.path().starts_with(prb_core::link::MERGE_STATUS_PREFIX));
        }
        (_, None) => panic!("recognized link without endpoint: {href}"),
    }
});
