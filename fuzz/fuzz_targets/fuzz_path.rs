// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fuzz target for path cleaning and base-directory resolution

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use naivefs_core::path::{self, PathResolver};

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    base: &'a str,
    name: &'a str,
}

fuzz_target!(|input: Input<'_>| {
    let cleaned = path::clean(input.name);
    assert_eq!(path::clean(&cleaned), cleaned);
    assert!(!cleaned.is_empty());

    let _ = path::parent(&cleaned);
    let _ = path::file_name(&cleaned);
    let _ = path::join(input.base, input.name);

    let resolver = PathResolver::new(input.base);
    let resolved = resolver.resolve(input.name);
    if path::is_absolute(input.name) {
        assert_eq!(resolved, cleaned);
    }

    assert!(!resolver.to_object_key(input.name).starts_with('/'));
    assert!(!resolver.to_share_path(input.name).contains('/'));
});
