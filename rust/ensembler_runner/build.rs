fn main() {
    if let Ok(protoc) = protoc_bin_vendored::protoc_bin_path() {
        // SAFETY: build scripts are single-threaded.
        unsafe {
            std::env::set_var("PROTOC", protoc);
        }
    }
    println!("cargo:rerun-if-changed=proto/ensembler.proto");

    if let Err(err) = tonic_build::configure()
        .build_client(true)
        .build_server(true)
        .compile_protos(&["proto/ensembler.proto"], &["proto"])
    {
        panic!("compile ensembler.proto: {err}");
    }
}
