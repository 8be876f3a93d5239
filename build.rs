//! Build script for relink
//!
//! On Windows, embeds `relink.manifest` declaring `longPathAware`, so link
//! enumeration and creation work on paths longer than 260 characters (with
//! the matching Windows 10 v1607+ system setting). Other platforms need
//! nothing.

fn main() {
    #[cfg(windows)]
    {
        embed_resource::compile("relink.rc", embed_resource::NONE);

        println!("cargo:rerun-if-changed=relink.rc");
        println!("cargo:rerun-if-changed=relink.manifest");
    }
}
