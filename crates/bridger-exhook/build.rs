// Compiles exhook.proto into Rust gRPC server types at build time.
// Unlike bridger-core's hand-written messages, the ExHook service needs a
// generated server trait, so this path runs for real rather than staying
// commented out.

fn main() {
    tonic_build::compile_protos("proto/exhook.proto").expect("failed to compile exhook.proto");
    println!("cargo:rerun-if-changed=proto/exhook.proto");
}
