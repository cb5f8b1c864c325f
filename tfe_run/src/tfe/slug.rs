//! Packs a configuration directory into the gzip compressed tarball ("slug") the upload endpoint expects.

use flate2::{write::GzEncoder, Compression};
use std::fs;
use std::io;
use std::path::Path;
use tar::Builder;

/// Version control metadata never belongs in a slug.
const GIT_DIR: &str = ".git";

/// Local provider plugins and state are machine specific; only downloaded modules are kept.
const TERRAFORM_DIR: &str = ".terraform";
const TERRAFORM_MODULES_DIR: &str = "modules";

/// Returns the directory as a .tar.gz archive with paths relative to `directory`.
pub fn pack(directory: &Path) -> io::Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = Builder::new(encoder);
    builder.follow_symlinks(false);

    append_dir(&mut builder, directory, Path::new(""))?;

    let encoder = builder.into_inner()?;
    encoder.finish()
}

fn append_dir<W: io::Write>(
    builder: &mut Builder<W>,
    root: &Path,
    relative: &Path,
) -> io::Result<()> {
    let mut entries = fs::read_dir(root.join(relative))?.collect::<io::Result<Vec<_>>>()?;

    // Sorted so identical directories always produce identical archives.
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let name = entry.file_name();
        let path = entry.path();
        let entry_relative = relative.join(&name);
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            if name == GIT_DIR {
                continue;
            }

            builder.append_dir(&entry_relative, &path)?;

            if name == TERRAFORM_DIR {
                let modules = entry_relative.join(TERRAFORM_MODULES_DIR);
                if root.join(&modules).is_dir() {
                    builder.append_dir(&modules, root.join(&modules))?;
                    append_dir(builder, root, &modules)?;
                }
                continue;
            }

            append_dir(builder, root, &entry_relative)?;
            continue;
        }

        builder.append_path_with_name(&path, &entry_relative)?;
    }

    Ok(())
}
