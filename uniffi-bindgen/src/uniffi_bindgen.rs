//! Generates the Swift and Kotlin bindings for `guardkit-core`.

fn main() {
    uniffi::uniffi_bindgen_main();
}
