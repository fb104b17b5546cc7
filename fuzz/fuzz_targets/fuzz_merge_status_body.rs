#![no_main]

use libfuzzer_sys::fuzz_target;
use prb_core::FetchError;
use prb_web::decode_response;

fuzz_target!(|input: (u16, &[u8])| {
    let (status, body) = input;
    match decode_response(status, body) {
        Ok(_) => assert!((200..300).contains(&status)),
        Err(FetchError::Remote { errors }) => assert!(!errors.is_empty()),
        Err(_) => {}
    }
});
