//! Locating font files for target languages.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use once_cell::sync::Lazy;

/// Candidate file names per language, in priority order.
fn candidates(language: &str) -> &'static [&'static str] {
    match language {
        "ja" => &[
            "ipag.ttf",
            "IPAGothic.ttf",
            "ipagp.ttf",
            "IPAPGothic.ttf",
            "ipam.ttf",
            "IPAMincho.ttf",
            "fonts-japanese-gothic.ttf",
            "NotoSansJP-Regular.ttf",
            "NotoSerifJP-Regular.ttf",
            "NotoSansJP-Regular.otf",
            "msgothic.ttc",
            "mspmincho.ttc",
            "YuGothic.ttc",
        ],
        "zh-CN" | "zh" => &[
            "NotoSansSC-Regular.ttf",
            "NotoSerifSC-Regular.ttf",
            "NotoSansSC-Regular.otf",
            "SimSun.ttf",
            "wqy-zenhei.ttc",
            "simsun.ttc",
            "msyh.ttc",
        ],
        "zh-TW" => &[
            "NotoSansTC-Regular.ttf",
            "NotoSerifTC-Regular.ttf",
            "NotoSansTC-Regular.otf",
            "mingliu.ttc",
            "msjh.ttc",
        ],
        "ko" => &[
            "malgun.ttf",
            "Malgun Gothic.ttf",
            "NotoSansKR-Regular.ttf",
            "NotoSerifKR-Regular.ttf",
            "NotoSansKR-Regular.otf",
            "batang.ttc",
        ],
        _ => &[
            "DejaVuSans.ttf",
            "LiberationSans-Regular.ttf",
            "FreeSans.ttf",
            "NotoSans-Regular.ttf",
            "arial.ttf",
            "Arial.ttf",
            "calibri.ttf",
            "segoeui.ttf",
            "DejaVuSerif.ttf",
            "LiberationSerif-Regular.ttf",
            "times.ttf",
        ],
    }
}

/// Candidate file names for a language; unknown languages use the Latin list.
pub fn font_candidates(language: &str) -> Vec<&'static str> {
    candidates(language)
        .iter()
        .copied()
        // a collection cannot be embedded as a single FontFile2
        .filter(|name| !is_collection(Path::new(name)))
        .collect()
}

/// Whether a path names a font collection.
pub fn is_collection(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("ttc") || e.eq_ignore_ascii_case("otc"))
        .unwrap_or(false)
}

/// Operating-system font directories.
pub fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if cfg!(target_os = "windows") {
        let windir = std::env::var("WINDIR").unwrap_or_else(|_| "C:\\Windows".to_string());
        dirs.push(PathBuf::from(windir).join("Fonts"));
    } else if cfg!(target_os = "macos") {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    } else {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(&home).join(".fonts"));
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }
    dirs
}

static LOOKUP_CACHE: Lazy<Mutex<HashMap<(PathBuf, String), Option<PathBuf>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Look for a file by name in a directory and up to two levels below it.
fn find_in_dir(dir: &Path, name: &str) -> Option<PathBuf> {
    let key = (dir.to_path_buf(), name.to_string());
    if let Ok(cache) = LOOKUP_CACHE.lock() {
        if let Some(hit) = cache.get(&key) {
            return hit.clone();
        }
    }

    let found = search(dir, name, 2);
    if let Ok(mut cache) = LOOKUP_CACHE.lock() {
        cache.insert(key, found.clone());
    }
    found
}

fn search(dir: &Path, name: &str, depth: usize) -> Option<PathBuf> {
    let direct = dir.join(name);
    if direct.is_file() {
        return Some(direct);
    }
    if depth == 0 {
        return None;
    }
    let mut subdirs: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    subdirs.sort();
    subdirs.iter().find_map(|sub| search(sub, name, depth - 1))
}

/// Find the first available face for a language.
///
/// `extra_dirs` are searched before the system directories.
pub fn find_font_for_language(language: &str, extra_dirs: &[PathBuf]) -> Option<PathBuf> {
    let mut dirs: Vec<PathBuf> = extra_dirs.to_vec();
    dirs.extend(system_font_dirs());
    for name in font_candidates(language) {
        for dir in &dirs {
            if !dir.is_dir() {
                continue;
            }
            if let Some(path) = find_in_dir(dir, name) {
                log::debug!("Font for '{}': {}", language, path.display());
                return Some(path);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collections_are_skipped() {
        assert!(font_candidates("ja").iter().all(|n| !n.ends_with(".ttc")));
        assert!(is_collection(Path::new("/x/NotoSansCJK.TTC")));
        assert!(!is_collection(Path::new("/x/ipag.ttf")));
    }

    #[test]
    fn test_unknown_language_uses_latin_list() {
        assert_eq!(font_candidates("fr"), font_candidates("en"));
    }

    #[test]
    fn test_find_in_nested_extra_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("truetype").join("dejavu");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("DejaVuSans.ttf"), b"not really a font").unwrap();

        let found = find_font_for_language("en", &[dir.path().to_path_buf()]).unwrap();
        assert!(found.ends_with("truetype/dejavu/DejaVuSans.ttf"));
    }
}
