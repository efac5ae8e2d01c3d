//! One-shot host provisioning that runs before any polling.
//!
//! The ingress hostnames (`nemo.test`, `nim.test`, `data-store.test`) must
//! resolve to the cluster IP. [`ensure_hosts`] edits a hosts file so that
//! each name maps to exactly that IP; running it twice changes nothing.

use std::path::Path;

use tracing::info;

use crate::error::JobwatchError;

const MARKER: &str = "# jobwatch";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct HostsChange {
    /// Names that had no entry before.
    pub added: Vec<String>,
    /// Names that pointed somewhere else and were moved.
    pub moved: Vec<String>,
}

impl HostsChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.moved.is_empty()
    }
}

/// Hostname part of a service URL, e.g. `nemo.test` for `http://nemo.test`.
pub fn host_of(url: &str) -> Result<String, JobwatchError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| JobwatchError::Config(format!("invalid URL {url:?}: {e}")))?;
    parsed
        .host_str()
        .map(str::to_string)
        .ok_or_else(|| JobwatchError::Config(format!("URL {url:?} has no host")))
}

/// Makes every name in `hosts` resolve to `ip` in the hosts file at `path`.
pub fn ensure_hosts(path: &Path, ip: &str, hosts: &[String]) -> Result<HostsChange, JobwatchError> {
    if ip.parse::<std::net::IpAddr>().is_err() {
        return Err(JobwatchError::Config(format!("not an IP address: {ip:?}")));
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    let (updated, change) = rewrite(&contents, ip, hosts);

    if !change.is_empty() {
        std::fs::write(path, updated)?;
        info!(
            path = %path.display(),
            ip,
            added = ?change.added,
            moved = ?change.moved,
            "Hosts file updated"
        );
    }
    Ok(change)
}

fn rewrite(contents: &str, ip: &str, hosts: &[String]) -> (String, HostsChange) {
    let mut change = HostsChange::default();
    let mut present: Vec<&str> = Vec::new();
    let mut lines: Vec<String> = Vec::new();

    for line in contents.lines() {
        let body = line.split('#').next().unwrap_or("");
        let mut fields = body.split_whitespace();
        let Some(line_ip) = fields.next() else {
            lines.push(line.to_string());
            continue;
        };
        let names: Vec<&str> = fields.collect();

        if line_ip == ip {
            for name in &names {
                if hosts.iter().any(|h| h == name) {
                    present.push(*name);
                }
            }
            lines.push(line.to_string());
            continue;
        }

        let stale: Vec<&str> = names
            .iter()
            .copied()
            .filter(|n| hosts.iter().any(|h| h == n))
            .collect();
        if stale.is_empty() {
            lines.push(line.to_string());
            continue;
        }
        change.moved.extend(stale.iter().map(|s| s.to_string()));
        let kept: Vec<&str> = names.into_iter().filter(|n| !stale.contains(n)).collect();
        if !kept.is_empty() {
            lines.push(format!("{line_ip}\t{}", kept.join(" ")));
        }
    }

    let missing: Vec<&String> = hosts
        .iter()
        .filter(|h| !present.contains(&h.as_str()))
        .collect();
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|h| h.as_str()).collect();
        lines.push(format!("{ip}\t{} {MARKER}", names.join(" ")));
        change.added = missing
            .into_iter()
            .filter(|h| !change.moved.contains(*h))
            .cloned()
            .collect();
    }

    let mut updated = lines.join("\n");
    updated.push('\n');
    (updated, change)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn adds_missing_entries_once() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hosts");
        std::fs::write(&path, "127.0.0.1\tlocalhost\n").unwrap();
        let hosts = names(&["nemo.test", "nim.test"]);

        let first = ensure_hosts(&path, "192.168.49.2", &hosts).unwrap();
        assert_eq!(first.added, hosts);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "127.0.0.1\tlocalhost\n192.168.49.2\tnemo.test nim.test # jobwatch\n"
        );

        let second = ensure_hosts(&path, "192.168.49.2", &hosts).unwrap();
        assert!(second.is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), contents);
    }

    #[test]
    fn moves_names_pointing_at_old_ip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hosts");
        std::fs::write(&path, "127.0.0.1 localhost\n192.168.49.9 nemo.test other.test\n").unwrap();

        let change = ensure_hosts(&path, "192.168.49.2", &names(&["nemo.test"])).unwrap();
        assert_eq!(change.moved, vec!["nemo.test"]);
        assert!(change.added.is_empty());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "127.0.0.1 localhost\n192.168.49.9\tother.test\n192.168.49.2\tnemo.test # jobwatch\n"
        );
    }

    #[test]
    fn existing_partial_line_is_kept() {
        let (updated, change) = rewrite(
            "# comment\n10.0.0.5 nemo.test\n",
            "10.0.0.5",
            &names(&["nemo.test", "data-store.test"]),
        );
        assert_eq!(change.added, vec!["data-store.test"]);
        assert_eq!(
            updated,
            "# comment\n10.0.0.5 nemo.test\n10.0.0.5\tdata-store.test # jobwatch\n"
        );
    }

    #[test]
    fn missing_file_is_created() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hosts");
        let change = ensure_hosts(&path, "10.0.0.1", &names(&["nim.test"])).unwrap();
        assert_eq!(change.added, vec!["nim.test"]);
        assert!(path.exists());
    }

    #[test]
    fn rejects_bad_ip() {
        let tmp = TempDir::new().unwrap();
        let err = ensure_hosts(&tmp.path().join("hosts"), "minikube", &names(&["a"])).unwrap_err();
        assert!(matches!(err, JobwatchError::Config(_)));
    }

    #[test]
    fn host_of_urls() {
        assert_eq!(host_of("http://nemo.test").unwrap(), "nemo.test");
        assert_eq!(host_of("http://data-store.test:8080/v1").unwrap(), "data-store.test");
        assert!(host_of("not a url").is_err());
    }
}
