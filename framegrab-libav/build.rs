use std::env;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    for lib in &["avutil", "avformat", "avcodec", "avdevice", "swscale"] {
        println!("cargo:rustc-link-lib={lib}");
    }

    let bindings = bindgen::builder()
        .header("src/bindings.h")
        .allowlist_function("av_.*|avcodec_.*|avformat_.*|avdevice_.*|sws_.*")
        .allowlist_type("AV.*|Sws.*")
        .allowlist_var("AV_.*|SWS_.*")
        .default_enum_style(bindgen::EnumVariation::NewType {
            is_bitfield: false,
            is_global: false,
        })
        .layout_tests(false)
        .parse_callbacks(Box::new(bindgen::CargoCallbacks::new()))
        .generate()?;
    let out_path = PathBuf::from(env::var("OUT_DIR")?);
    bindings.write_to_file(out_path.join("bindings.rs"))?;
    Ok(())
}
