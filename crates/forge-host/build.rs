use std::env;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

/// Generates `$OUT_DIR/assets.rs`. Release builds set `FORGE_EMBED_DIR` to a
/// web directory whose files are compiled into the binary; otherwise assets
/// are read from disk at runtime.
fn main() -> io::Result<()> {
    println!("cargo:rerun-if-env-changed=FORGE_EMBED_DIR");

    let out_dir = env::var("OUT_DIR").map_err(io::Error::other)?;
    let mut f = File::create(Path::new(&out_dir).join("assets.rs"))?;

    match env::var("FORGE_EMBED_DIR") {
        Ok(embed_dir) if Path::new(&embed_dir).is_dir() => {
            println!("cargo:rerun-if-changed={}", embed_dir);
            let mut entries = Vec::new();
            collect_files(Path::new(&embed_dir), Path::new(&embed_dir), &mut entries)?;
            write_embedded(&mut f, &entries)?;
            println!(
                "cargo:warning=Embedded {} assets from {}",
                entries.len(),
                embed_dir
            );
        }
        _ => write_empty(&mut f)?,
    }
    Ok(())
}

fn write_embedded(f: &mut File, entries: &[(String, Vec<u8>)]) -> io::Result<()> {
    writeln!(f, "pub const ASSET_EMBEDDED: bool = true;")?;
    writeln!(f)?;
    for (i, (_path, bytes)) in entries.iter().enumerate() {
        writeln!(f, "static ASSET_{}: &[u8] = &{:?};", i, bytes)?;
    }
    writeln!(f)?;
    writeln!(f, "pub fn get_asset(path: &str) -> Option<&'static [u8]> {{")?;
    writeln!(f, "    match path {{")?;
    for (i, (path, _)) in entries.iter().enumerate() {
        writeln!(f, "        {:?} => Some(ASSET_{}),", path, i)?;
    }
    writeln!(f, "        _ => None,")?;
    writeln!(f, "    }}")?;
    writeln!(f, "}}")
}

fn write_empty(f: &mut File) -> io::Result<()> {
    writeln!(f, "pub const ASSET_EMBEDDED: bool = false;")?;
    writeln!(f)?;
    writeln!(f, "#[allow(unused_variables)]")?;
    writeln!(f, "pub fn get_asset(path: &str) -> Option<&'static [u8]> {{")?;
    writeln!(f, "    None")?;
    writeln!(f, "}}")
}

/// Keys are paths relative to `base` with forward slashes.
fn collect_files(base: &Path, current: &Path, entries: &mut Vec<(String, Vec<u8>)>) -> io::Result<()> {
    for entry in fs::read_dir(current)?.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(base, &path, entries)?;
        } else if path.is_file() {
            let bytes = fs::read(&path)?;
            if let Ok(relative) = path.strip_prefix(base) {
                entries.push((relative.to_string_lossy().replace('\\', "/"), bytes));
            }
        }
    }
    Ok(())
}
