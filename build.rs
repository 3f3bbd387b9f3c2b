use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let proto = PathBuf::from("proto/echo.proto");
    println!("cargo:rerun-if-changed={}", proto.display());

    let mut config = prost_build::Config::new();
    config.bytes(["."]);

    match protoc_bin_vendored::protoc_bin_path() {
        Ok(path) => {
            config.protoc_executable(path);
        }
        Err(err) => {
            println!("cargo:warning=vendored protoc unavailable, using system protoc: {err}");
        }
    }

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos_with_config(config, &[proto], &[PathBuf::from("proto")])?;

    Ok(())
}
