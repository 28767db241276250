use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Every image under `root`, recursively, in sorted path order.
pub fn find_images(root: &Path) -> io::Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a directory", root.display()),
        ));
    }

    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                pending.push(path);
            } else if is_image(&path) {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_images_recursively_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("batch2/back")).unwrap();
        for name in ["b.jpg", "a.PNG", "notes.txt", "batch2/c.jpeg", "batch2/back/d.bmp", "batch2/e.tiff"] {
            fs::write(root.join(name), b"x").unwrap();
        }

        let found = find_images(root).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();

        assert_eq!(names, ["a.PNG", "b.jpg", "batch2/back/d.bmp", "batch2/c.jpeg"]);
    }

    #[test]
    fn empty_directory_has_no_images() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_images(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_images(&dir.path().join("nope")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn file_instead_of_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("card.jpg");
        fs::write(&file, b"x").unwrap();
        assert!(find_images(&file).is_err());
    }
}
