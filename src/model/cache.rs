// SPDX-License-Identifier: MPL-2.0

//! Texture deduplication for model loading.

use std::{
    collections::HashMap,
    path::{Component, Path, PathBuf},
};

use super::TextureKind;

/// Loads a texture from a file and produces a handle to it.
pub trait TextureLoader {
    /// A cheaply clonable reference to a loaded texture.
    type Handle: Clone;
    type Error;

    fn load(&mut self, path: &Path, kind: TextureKind) -> Result<Self::Handle, Self::Error>;
}

/// Ensures each distinct texture file is loaded at most once.
///
/// Material files refer to textures by paths relative to the model's directory, and different
/// materials may spell the same file differently (`./wood.png`, `maps/../wood.png`). Keys are
/// therefore normalized before lookup.
pub struct TextureCache<L: TextureLoader> {
    loader: L,
    loaded: HashMap<PathBuf, L::Handle>,
}

impl<L: TextureLoader> TextureCache<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            loaded: HashMap::new(),
        }
    }

    /// Returns the handle for `directory/relative`, loading the file on first use.
    ///
    /// `kind` is passed to the loader only on that first load; a file referenced as both a diffuse
    /// and a specular map shares one handle.
    pub fn get_or_load(
        &mut self,
        directory: &Path,
        relative: &str,
        kind: TextureKind,
    ) -> Result<L::Handle, L::Error> {
        let key = normalize(&directory.join(relative.replace('\\', "/")));
        if let Some(handle) = self.loaded.get(&key) {
            tracing::trace!("Reusing texture {}", key.display());
            return Ok(handle.clone());
        }

        let handle = self.loader.load(&key, kind)?;
        self.loaded.insert(key, handle.clone());

        Ok(handle)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.loaded.contains_key(&normalize(path))
    }

    /// The number of distinct textures loaded so far.
    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn into_loader(self) -> L {
        self.loader
    }
}

/// Lexically normalizes `path`: `.` components are dropped and `..` removes the preceding
/// normal component where there is one.
///
/// The file system is never consulted, so symbolic links are not resolved.
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match result.components().next_back() {
                Some(Component::Normal(_)) => {
                    result.pop();
                }
                // `..` at the root is the root itself.
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => result.push(".."),
            },
            other => result.push(other.as_os_str()),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingLoader {
        loads: Vec<(PathBuf, TextureKind)>,
    }

    impl TextureLoader for CountingLoader {
        type Handle = usize;
        type Error = String;

        fn load(&mut self, path: &Path, kind: TextureKind) -> Result<usize, String> {
            if path.ends_with("broken.png") {
                return Err(format!("cannot decode {}", path.display()));
            }
            self.loads.push((path.to_owned(), kind));

            Ok(self.loads.len() - 1)
        }
    }

    #[test]
    fn normalize_folds_dots() {
        assert_eq!(normalize(Path::new("a/./b/../c.png")), PathBuf::from("a/c.png"));
        assert_eq!(normalize(Path::new("../x/../../y")), PathBuf::from("../../y"));
        assert_eq!(normalize(Path::new("/../tex.png")), PathBuf::from("/tex.png"));
        assert_eq!(normalize(Path::new("./")), PathBuf::new());
    }

    #[test]
    fn each_path_loads_once() {
        let mut cache = TextureCache::new(CountingLoader::default());
        let dir = Path::new("assets/backpack");

        let a = cache.get_or_load(dir, "diffuse.jpg", TextureKind::Diffuse).unwrap();
        let b = cache.get_or_load(dir, "./diffuse.jpg", TextureKind::Diffuse).unwrap();
        let c = cache
            .get_or_load(dir, "maps/../diffuse.jpg", TextureKind::Specular)
            .unwrap();
        let d = cache.get_or_load(dir, "specular.jpg", TextureKind::Specular).unwrap();

        assert_eq!((a, b, c, d), (0, 0, 0, 1));
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(Path::new("assets/backpack/diffuse.jpg")));
        assert_eq!(
            cache.into_loader().loads,
            vec![
                (PathBuf::from("assets/backpack/diffuse.jpg"), TextureKind::Diffuse),
                (PathBuf::from("assets/backpack/specular.jpg"), TextureKind::Specular),
            ]
        );
    }

    #[test]
    fn backslashes_are_separators() {
        let mut cache = TextureCache::new(CountingLoader::default());
        let dir = Path::new("model");

        cache.get_or_load(dir, "tex\\wood.png", TextureKind::Diffuse).unwrap();
        cache.get_or_load(dir, "tex/wood.png", TextureKind::Diffuse).unwrap();

        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failures_are_not_cached() {
        let mut cache = TextureCache::new(CountingLoader::default());
        let dir = Path::new("model");

        assert!(cache.get_or_load(dir, "broken.png", TextureKind::Normal).is_err());
        assert!(cache.is_empty());
    }
}
