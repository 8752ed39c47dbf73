use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::config::ArchiveConfig;

/// Write the digest page to `<site_dir>/<YYYY-MM-DD>/index.html` and return
/// the relative archive URL for linking in the email. Returns `None` when
/// archiving is disabled.
pub fn write_archive(cfg: &ArchiveConfig, digest_date: &str, html: &str) -> Result<Option<String>> {
    if !cfg.enabled {
        return Ok(None);
    }

    let out_dir = Path::new(&cfg.site_dir).join(digest_date);
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create archive directory {}", out_dir.display()))?;

    let out_path = out_dir.join("index.html");
    fs::write(&out_path, html)
        .with_context(|| format!("Failed to write archive page {}", out_path.display()))?;

    Ok(Some(format!("{}/", digest_date)))
}

/// Regenerate `<site_dir>/index.html` as a landing page listing the newest
/// digests. Directories that don't look like dated archives are ignored.
pub fn update_home_index(cfg: &ArchiveConfig) -> Result<()> {
    if !cfg.enabled {
        return Ok(());
    }

    let root = Path::new(&cfg.site_dir);
    fs::create_dir_all(root)
        .with_context(|| format!("Failed to create site directory {}", root.display()))?;

    let mut dates: Vec<String> = Vec::new();
    for entry in
        fs::read_dir(root).with_context(|| format!("Failed to read {}", root.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if path.is_dir() && is_digest_date(name) && path.join("index.html").exists() {
            dates.push(name.to_string());
        }
    }
    dates.sort_by(|a, b| b.cmp(a));

    let items: String = dates
        .iter()
        .take(60)
        .map(|d| format!("<li><a href='{}/'>{}</a></li>\n", d, d))
        .collect();

    let html = format!(
        "<html><head><meta charset=\"utf-8\">\n\
         <style>\n\
           body {{ font-family: -apple-system, Segoe UI, Roboto, Arial, sans-serif; margin: 24px; }}\n\
           .container {{ max-width: 780px; margin: 0 auto; }}\n\
         </style>\n\
         </head><body><div class=\"container\">\n\
           <h1>Daily Digest Archive</h1>\n\
           <ul>{}</ul>\n\
         </div></body></html>",
        items
    );

    fs::write(root.join("index.html"), html)
        .with_context(|| format!("Failed to write {}/index.html", cfg.site_dir))?;

    println!(
        "Updated {}/index.html with {} entries",
        cfg.site_dir,
        dates.len().min(60)
    );
    Ok(())
}

// YYYY-MM-DD
fn is_digest_date(name: &str) -> bool {
    name.len() == 10
        && name.as_bytes()[4] == b'-'
        && name.as_bytes()[7] == b'-'
        && name
            .chars()
            .enumerate()
            .all(|(i, c)| matches!(i, 4 | 7) || c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_site(tag: &str) -> (ArchiveConfig, PathBuf) {
        let dir = std::env::temp_dir().join(format!("daily-digest-test-{}-{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let cfg = ArchiveConfig {
            enabled: true,
            site_dir: dir.to_string_lossy().into_owned(),
        };
        (cfg, dir)
    }

    #[test]
    fn recognizes_dated_directories() {
        assert!(is_digest_date("2026-08-05"));
        assert!(!is_digest_date("2026-8-05"));
        assert!(!is_digest_date("notes"));
        assert!(!is_digest_date("2026-08-05-draft"));
    }

    #[test]
    fn writes_archive_and_returns_relative_url() {
        let (cfg, dir) = temp_site("write");

        let url = write_archive(&cfg, "2026-08-05", "<html>hi</html>").unwrap();
        assert_eq!(url.as_deref(), Some("2026-08-05/"));

        let written = fs::read_to_string(dir.join("2026-08-05").join("index.html")).unwrap();
        assert_eq!(written, "<html>hi</html>");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn disabled_archive_writes_nothing() {
        let (mut cfg, dir) = temp_site("disabled");
        cfg.enabled = false;

        let url = write_archive(&cfg, "2026-08-05", "<html>hi</html>").unwrap();
        assert!(url.is_none());
        assert!(!dir.exists());
    }

    #[test]
    fn home_index_lists_newest_first() {
        let (cfg, dir) = temp_site("index");

        write_archive(&cfg, "2026-08-04", "a").unwrap();
        write_archive(&cfg, "2026-08-05", "b").unwrap();
        fs::create_dir_all(dir.join("assets")).unwrap();

        update_home_index(&cfg).unwrap();

        let index = fs::read_to_string(dir.join("index.html")).unwrap();
        assert!(index.contains("Daily Digest Archive"));
        assert!(index.contains("2026-08-05/"));
        assert!(index.contains("2026-08-04/"));
        assert!(!index.contains("assets"));
        let newest = index.find("2026-08-05").unwrap();
        let older = index.find("2026-08-04").unwrap();
        assert!(newest < older);

        let _ = fs::remove_dir_all(&dir);
    }
}
