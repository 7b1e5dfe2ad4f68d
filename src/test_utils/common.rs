use nanoid::nanoid;

use crate::Message;
use crate::Rule;

pub fn rule(parts: &[&str]) -> Rule {
    parts.iter().map(|s| s.to_string()).collect()
}

/// AddOne message whose serialized form is exactly `len` bytes, padded with a
/// highly compressible filler.
pub fn message_of_size(
    id: &str,
    len: usize,
) -> Message {
    padded_message(id, len, |n| "x".repeat(n))
}

/// Like [`message_of_size`] but padded with random identifier characters, so
/// deflate gains little.
pub fn noisy_message_of_size(
    id: &str,
    len: usize,
) -> Message {
    padded_message(id, len, |n| nanoid!(n))
}

fn padded_message(
    id: &str,
    len: usize,
    filler: impl Fn(usize) -> String,
) -> Message {
    let build = |pad: String| Message::add_one(id, "p", "p", vec![pad, "data".into(), "read".into()]);

    let base = build(String::new()).encode().unwrap().len();
    assert!(len >= base, "cannot build a {len}-byte message, minimum is {base}");

    let message = build(filler(len - base));
    assert_eq!(message.encode().unwrap().len(), len);
    message
}
