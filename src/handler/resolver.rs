//! Resource resolution module
//!
//! Maps a request path onto the subsystem that answers it. Order: proxy prefixes,
//! listing resources, stubs, alias fallbacks, then the local filesystem.

use crate::config::Config;
use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};

/// What answers a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Forward to proxy route `route`; `remainder` is the raw path after its prefix
    Proxy { route: usize, remainder: String },
    /// Synthesize a plain-text listing of this directory
    DirectoryListing(PathBuf),
    /// Serve stub resource `index` from `site.stubs`
    Stub(usize),
    /// Serve this file
    Local(PathBuf),
    /// Directory without an index file
    Directory(PathBuf),
    /// 301 to this location
    Redirect(String),
    NotFound,
}

/// Resolve a raw (percent-encoded) request path
pub fn resolve(path: &str, query: Option<&str>, config: &Config, root: &Path) -> Resolution {
    if let Some((route, prefix)) = config
        .proxy
        .routes
        .iter()
        .enumerate()
        .find(|(_, r)| path.starts_with(&r.prefix))
        .map(|(i, r)| (i, r.prefix.as_str()))
    {
        return Resolution::Proxy {
            route,
            remainder: path[prefix.len()..].to_string(),
        };
    }

    let listing_suffix = format!("/{}", config.site.listing_name);
    if decode(path).ends_with(&listing_suffix) {
        return resolve_listing(path, root);
    }

    if let Some(index) = config.site.stubs.iter().position(|s| s.matches(path)) {
        return Resolution::Stub(index);
    }

    for alias in &config.site.aliases {
        let Some(rest) = path.strip_prefix(alias.prefix.as_str()) else {
            continue;
        };
        if translate_path(root, path).exists() {
            break;
        }
        let fallback = format!("{}{rest}", alias.fallback_prefix);
        if translate_path(root, &fallback).exists() {
            return resolve_local(&fallback, query, config, root);
        }
        break;
    }

    resolve_local(path, query, config, root)
}

fn resolve_listing(path: &str, root: &Path) -> Resolution {
    let fs_path = translate_path(root, path);
    if fs_path.is_file() {
        return Resolution::Local(fs_path);
    }
    match fs_path.parent() {
        Some(dir) if dir.is_dir() => Resolution::DirectoryListing(dir.to_path_buf()),
        _ => Resolution::NotFound,
    }
}

fn resolve_local(path: &str, query: Option<&str>, config: &Config, root: &Path) -> Resolution {
    let fs_path = translate_path(root, path);

    if fs_path.is_dir() {
        if !path.ends_with('/') {
            let target = match query {
                Some(q) => format!("{path}/?{q}"),
                None => format!("{path}/"),
            };
            return Resolution::Redirect(target);
        }
        return config
            .site
            .index_files
            .iter()
            .map(|name| fs_path.join(name))
            .find(|candidate| candidate.is_file())
            .map_or(Resolution::Directory(fs_path), Resolution::Local);
    }

    // "file/" names a directory that does not exist
    if fs_path.is_file() && !path.ends_with('/') {
        return Resolution::Local(fs_path);
    }

    Resolution::NotFound
}

/// Percent-decode a URL path
pub fn decode(path: &str) -> String {
    percent_decode_str(path).decode_utf8_lossy().into_owned()
}

/// Map a URL path onto the filesystem under `root`
///
/// Empty, `.` and `..` segments are discarded, as are segments carrying a
/// backslash, so the result never leaves `root`.
pub fn translate_path(root: &Path, url_path: &str) -> PathBuf {
    let decoded = decode(url_path);
    let mut fs_path = root.to_path_buf();
    for segment in decoded.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
            continue;
        }
        fs_path.push(segment);
    }
    fs_path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AliasRule, ProxyRoute};
    use std::fs;

    fn setup() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("assets/sub")).unwrap();
        fs::create_dir_all(dir.path().join("site")).unwrap();
        fs::write(dir.path().join("assets/a.txt"), b"a").unwrap();
        fs::write(dir.path().join("site/index.html"), b"<p>").unwrap();
        fs::create_dir_all(dir.path().join("game/core/graphics")).unwrap();
        fs::write(dir.path().join("game/core/graphics/ship.png"), b"png").unwrap();

        let mut config = Config::default();
        config.proxy.routes = vec![ProxyRoute {
            prefix: "/proxy/1.0/".to_string(),
            upstream: "http://127.0.0.1:9/".to_string(),
            local_override: None,
            patch: true,
        }];
        config.site.aliases = vec![AliasRule {
            prefix: "/game/graphics/".to_string(),
            fallback_prefix: "/game/core/graphics/".to_string(),
        }];
        (dir, config)
    }

    #[test]
    fn test_proxy_prefix_first() {
        let (dir, config) = setup();
        assert_eq!(
            resolve("/proxy/1.0/lib/cj3.js", None, &config, dir.path()),
            Resolution::Proxy {
                route: 0,
                remainder: "lib/cj3.js".to_string()
            }
        );
        assert_eq!(
            resolve("/proxy/1.0/index.list", None, &config, dir.path()),
            Resolution::Proxy {
                route: 0,
                remainder: "index.list".to_string()
            }
        );
    }

    #[test]
    fn test_listing_resolution() {
        let (dir, config) = setup();
        assert_eq!(
            resolve("/assets/index.list", None, &config, dir.path()),
            Resolution::DirectoryListing(dir.path().join("assets"))
        );
        assert_eq!(
            resolve("/missing/index.list", None, &config, dir.path()),
            Resolution::NotFound
        );
        fs::write(dir.path().join("assets/index.list"), b"literal").unwrap();
        assert_eq!(
            resolve("/assets/index.list", None, &config, dir.path()),
            Resolution::Local(dir.path().join("assets/index.list"))
        );
    }

    #[test]
    fn test_directory_redirect_keeps_query() {
        let (dir, config) = setup();
        assert_eq!(
            resolve("/assets", Some("v=1"), &config, dir.path()),
            Resolution::Redirect("/assets/?v=1".to_string())
        );
        assert_eq!(
            resolve("/assets/sub", None, &config, dir.path()),
            Resolution::Redirect("/assets/sub/".to_string())
        );
    }

    #[test]
    fn test_directory_index_and_autoindex() {
        let (dir, config) = setup();
        assert_eq!(
            resolve("/site/", None, &config, dir.path()),
            Resolution::Local(dir.path().join("site/index.html"))
        );
        assert_eq!(
            resolve("/assets/", None, &config, dir.path()),
            Resolution::Directory(dir.path().join("assets"))
        );
    }

    #[test]
    fn test_local_and_not_found() {
        let (dir, config) = setup();
        assert_eq!(
            resolve("/assets/a.txt", None, &config, dir.path()),
            Resolution::Local(dir.path().join("assets/a.txt"))
        );
        assert_eq!(
            resolve("/assets/a.txt/", None, &config, dir.path()),
            Resolution::NotFound
        );
        assert_eq!(
            resolve("/assets/b.txt", None, &config, dir.path()),
            Resolution::NotFound
        );
    }

    #[test]
    fn test_stub_resolution() {
        let (dir, config) = setup();
        assert_eq!(
            resolve("/app/log4j.xml", None, &config, dir.path()),
            Resolution::Stub(0)
        );
    }

    #[test]
    fn test_alias_fallback() {
        let (dir, config) = setup();
        assert_eq!(
            resolve("/game/graphics/ship.png", None, &config, dir.path()),
            Resolution::Local(dir.path().join("game/core/graphics/ship.png"))
        );
        assert_eq!(
            resolve("/game/graphics/none.png", None, &config, dir.path()),
            Resolution::NotFound
        );
    }

    #[test]
    fn test_translate_path_stays_in_root() {
        let root = Path::new("/srv/www");
        assert_eq!(
            translate_path(root, "/a/../../etc/passwd"),
            PathBuf::from("/srv/www/a/etc/passwd")
        );
        assert_eq!(
            translate_path(root, "/%2e%2e/secret"),
            PathBuf::from("/srv/www/secret")
        );
        assert_eq!(
            translate_path(root, "/my%20file.txt"),
            PathBuf::from("/srv/www/my file.txt")
        );
    }
}
