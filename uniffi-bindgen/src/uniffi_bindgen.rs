//! Generates Swift and Kotlin bindings for `passkit-core` built with `--features ffi`.

fn main() {
    uniffi::uniffi_bindgen_main();
}
