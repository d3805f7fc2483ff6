use anyhow::Result;
use failover_core::config::model::{canonicalize_base_uri, switch_ws_to_http};
use rand::seq::SliceRandom;
use reqwest::Url;
use std::sync::Arc;

/// 候选节点列表
///
/// 构造时确定，生命周期内不可变。地址已被规范化并去重，保留首次出现的顺序。
#[derive(Debug, Clone)]
pub struct NodeList {
    uris: Arc<[String]>,
}

impl NodeList {
    /// 创建节点列表，空列表或非法地址会立即返回错误
    pub fn new<I, S>(uris: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut canonical: Vec<String> = Vec::new();
        for uri in uris {
            let uri = canonicalize_base_uri(uri.as_ref())?;
            if !canonical.contains(&uri) {
                canonical.push(uri);
            }
        }

        if canonical.is_empty() {
            anyhow::bail!("Must specify at least one URL");
        }

        Ok(Self {
            uris: canonical.into(),
        })
    }

    /// 创建节点列表并打乱顺序
    pub fn shuffled<I, S>(uris: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let list = Self::new(uris)?;
        let mut uris = list.uris.to_vec();
        uris.shuffle(&mut rand::rng());
        Ok(Self { uris: uris.into() })
    }

    pub fn len(&self) -> usize {
        self.uris.len()
    }

    /// 构造保证非空，始终返回 false
    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }

    /// 按位置取节点，位置会对长度取模
    pub fn get(&self, index: usize) -> &str {
        &self.uris[index % self.uris.len()]
    }

    pub fn position_of(&self, uri: &str) -> Option<usize> {
        self.uris.iter().position(|u| u == uri)
    }

    /// 找到作为给定完整地址前缀的节点
    ///
    /// scheme、host、port 必须一致，节点的 path 必须是地址 path 的前缀（按路径段比较）。
    /// 用于把 308 的 `Location` 映射回节点列表中的位置。
    pub fn position_for_url(&self, url: &str) -> Option<usize> {
        let mut url = Url::parse(&switch_ws_to_http(url.trim())).ok()?;
        url.set_query(None);
        url.set_fragment(None);
        let target = url.as_str().trim_end_matches('/');

        self.uris.iter().position(|base| {
            target == base
                || target
                    .strip_prefix(base.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.uris.iter().map(|u| u.as_str())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.uris
    }
}

impl std::fmt::Display for NodeList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "server list: [{}]", self.uris.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list_is_rejected() {
        let result = NodeList::new(Vec::<String>::new());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("at least one URL"));
    }

    #[test]
    fn test_invalid_uri_is_rejected() {
        assert!(NodeList::new(["http://a:80", "mailto:someone"]).is_err());
    }

    #[test]
    fn test_canonicalizes_and_dedupes_preserving_order() {
        let list = NodeList::new(["http://b:80/api/", "ws://a:81", "http://b:80/api"]).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(0), "http://b/api");
        assert_eq!(list.get(1), "http://a:81");
        assert_eq!(list.position_of("http://a:81"), Some(1));
    }

    #[test]
    fn test_position_for_url_matches_base_prefix() {
        let list = NodeList::new(["http://a:8080/api", "http://b:8080/api", "http://c"]).unwrap();

        assert_eq!(list.position_for_url("http://b:8080/api/ping?x=1"), Some(1));
        assert_eq!(list.position_for_url("http://a:8080/api"), Some(0));
        assert_eq!(list.position_for_url("ws://c/stream"), Some(2));
        // 端口不同或路径只是字符串前缀都不算
        assert_eq!(list.position_for_url("http://a:9090/api/ping"), None);
        assert_eq!(list.position_for_url("http://a:8080/apiv2/ping"), None);
        assert_eq!(list.position_for_url("http://b:8080/other"), None);
        assert_eq!(list.position_for_url("not a url"), None);
    }

    #[test]
    fn test_get_wraps_around() {
        let list = NodeList::new(["http://a", "http://b", "http://c"]).unwrap();
        assert_eq!(list.get(3), "http://a");
        assert_eq!(list.get(7), "http://b");
    }

    #[test]
    fn test_shuffled_keeps_all_nodes() {
        let uris = ["http://a", "http://b", "http://c", "http://d"];
        let list = NodeList::shuffled(uris).unwrap();
        assert_eq!(list.len(), 4);
        for uri in uris {
            assert!(list.position_of(uri).is_some());
        }
    }
}
