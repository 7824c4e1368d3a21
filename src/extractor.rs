use std::{sync::Arc, time::Duration};

use tracing::trace;

use crate::{
    common::{NameToken, TextUnit},
    error::OracleError,
    oracles::NameOracle,
};

/// Pulls the tokens tagged as proper names out of a text unit.
#[derive(Clone)]
pub struct Extractor {
    oracle: Arc<dyn NameOracle>,
    name_tag: Arc<str>,
    timeout: Option<Duration>,
}

impl Extractor {
    pub fn new(oracle: Arc<dyn NameOracle>, name_tag: &str) -> Self {
        Self {
            oracle,
            name_tag: Arc::from(name_tag),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn extract(&self, unit: &TextUnit) -> Result<Vec<NameToken>, OracleError> {
        extract_names(self.oracle.as_ref(), &self.name_tag, &unit.text)
    }

    /// Runs the oracle on the blocking pool, bounded by the configured timeout.
    ///
    /// A timed out tagging call is abandoned, not interrupted: its thread
    /// finishes in the background and the result is discarded.
    pub async fn extract_async(&self, unit: &TextUnit) -> Result<Vec<NameToken>, OracleError> {
        let oracle = Arc::clone(&self.oracle);
        let name_tag = Arc::clone(&self.name_tag);
        let text = unit.text.clone();
        let handle =
            tokio::task::spawn_blocking(move || extract_names(oracle.as_ref(), &name_tag, &text));

        let joined = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, handle)
                .await
                .map_err(|_| OracleError::TimedOut(limit))?,
            None => handle.await,
        };
        let names = joined.map_err(|err| OracleError::Panicked(err.to_string()))??;
        trace!(unit = unit.index, names = names.len(), "extracted names");
        Ok(names)
    }
}

fn extract_names(
    oracle: &dyn NameOracle,
    name_tag: &str,
    text: &str,
) -> Result<Vec<NameToken>, OracleError> {
    Ok(oracle
        .tag(text)?
        .into_iter()
        .filter(|tagged| tagged.tag == name_tag)
        .map(|tagged| tagged.token)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracles::{LexiconOracle, Tagged};

    fn unit(text: &str) -> TextUnit {
        TextUnit {
            index: 0,
            lines: 0..1,
            text: text.to_string(),
        }
    }

    fn extractor() -> Extractor {
        let oracle = LexiconOracle::from_entries([
            ("甲", "nr"),
            ("乙", "nr"),
            ("丙", "nr"),
            ("见到", "v"),
        ]);
        Extractor::new(Arc::new(oracle), "nr")
    }

    #[test]
    fn keeps_only_names_in_order() {
        let names = extractor().extract(&unit("甲见到了乙。乙与丙交谈。")).unwrap();
        assert_eq!(names, vec!["甲", "乙", "乙", "丙"]);
    }

    #[test]
    fn honours_configured_tag() {
        let oracle = LexiconOracle::from_entries([("甲", "nr"), ("见到", "v")]);
        let extractor = Extractor::new(Arc::new(oracle), "v");
        assert_eq!(extractor.extract(&unit("甲见到")).unwrap(), vec!["见到"]);
    }

    #[test]
    fn oracle_failure_propagates() {
        let failing = |_: &str| -> Result<Vec<Tagged>, OracleError> {
            Err(OracleError::Failed("model not loaded".to_string()))
        };
        let extractor = Extractor::new(Arc::new(failing), "nr");
        assert_eq!(
            extractor.extract(&unit("甲")),
            Err(OracleError::Failed("model not loaded".to_string()))
        );
    }

    #[tokio::test]
    async fn async_extraction_matches_sync() {
        let extractor = extractor();
        let unit = unit("丙离开了。甲");
        assert_eq!(
            extractor.extract_async(&unit).await.unwrap(),
            extractor.extract(&unit).unwrap()
        );
    }

    #[tokio::test]
    async fn slow_oracle_times_out() {
        let slow = |_: &str| -> Result<Vec<Tagged>, OracleError> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(Vec::new())
        };
        let limit = Duration::from_millis(20);
        let extractor = Extractor::new(Arc::new(slow), "nr").with_timeout(Some(limit));
        assert_eq!(
            extractor.extract_async(&unit("甲")).await,
            Err(OracleError::TimedOut(limit))
        );
    }

    #[tokio::test]
    async fn panicking_oracle_is_reported() {
        let broken = |_: &str| -> Result<Vec<Tagged>, OracleError> { panic!("corrupt model") };
        let extractor = Extractor::new(Arc::new(broken), "nr");
        assert!(matches!(
            extractor.extract_async(&unit("甲")).await,
            Err(OracleError::Panicked(_))
        ));
    }
}
