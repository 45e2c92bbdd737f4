//! Alertmanager webhook payload (version 4).

use alertplot_core::{Alert, Labels};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::PipelineError;

/// Query parameter of a generator URL that holds the alerting expression.
pub const EXPRESSION_PARAM: &str = "g0.expr";

/// A webhook call from Alertmanager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookMessage {
    /// Payload format version.
    #[serde(default)]
    pub version: String,
    /// Key identifying the alert group.
    #[serde(default)]
    pub group_key: String,
    /// `firing` or `resolved`.
    #[serde(default)]
    pub status: String,
    /// Name of the receiver that routed this call.
    #[serde(default)]
    pub receiver: String,
    /// Labels the group was formed by.
    #[serde(default)]
    pub group_labels: Labels,
    /// Labels shared by every alert.
    #[serde(default)]
    pub common_labels: Labels,
    /// Annotations shared by every alert.
    #[serde(default)]
    pub common_annotations: Labels,
    /// Alertmanager's own URL.
    #[serde(default, rename = "externalURL")]
    pub external_url: String,
    /// The alerts.
    pub alerts: Vec<HookAlert>,
}

/// One alert of a webhook call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookAlert {
    /// `firing` or `resolved`.
    #[serde(default)]
    pub status: String,
    /// Alert labels.
    #[serde(default)]
    pub labels: Labels,
    /// Alert annotations.
    #[serde(default)]
    pub annotations: Labels,
    /// When the alert started firing.
    pub starts_at: DateTime<Utc>,
    /// When the alert resolved; `0001-01-01T00:00:00Z` while firing.
    #[serde(default)]
    pub ends_at: DateTime<Utc>,
    /// Link back to the rule's expression in the Prometheus UI.
    #[serde(default, rename = "generatorURL")]
    pub generator_url: String,
    /// Alert fingerprint.
    #[serde(default)]
    pub fingerprint: String,
}

impl HookAlert {
    /// Returns the alerting expression embedded in the generator URL.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Payload` if the URL does not parse or has no
    /// non-empty `g0.expr` parameter.
    pub fn generator_expression(&self) -> Result<String, PipelineError> {
        let url = Url::parse(&self.generator_url).map_err(|e| {
            PipelineError::Payload(format!("invalid generatorURL {:?}: {e}", self.generator_url))
        })?;

        url.query_pairs()
            .find(|(key, _)| key == EXPRESSION_PARAM)
            .map(|(_, value)| value.into_owned())
            .filter(|expr| !expr.trim().is_empty())
            .ok_or_else(|| {
                PipelineError::Payload(format!("generatorURL has no {EXPRESSION_PARAM} parameter"))
            })
    }

    /// Converts to the core alert type.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Payload` if the alerting expression cannot be
    /// recovered.
    pub fn to_alert(&self) -> Result<Alert, PipelineError> {
        Ok(Alert {
            labels: self.labels.clone(),
            annotations: self.annotations.clone(),
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            generator_expression: self.generator_expression()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_case::test_case;

    const PAYLOAD: &str = r#"{
        "version": "4",
        "groupKey": "{}:{alertname=\"HighErrorRate\"}",
        "status": "firing",
        "receiver": "alertplot",
        "groupLabels": {"alertname": "HighErrorRate"},
        "commonLabels": {"alertname": "HighErrorRate", "job": "api"},
        "commonAnnotations": {"summary": "error rate above 5%"},
        "externalURL": "http://alertmanager:9093",
        "alerts": [
            {
                "status": "firing",
                "labels": {"alertname": "HighErrorRate", "job": "api", "instance": "api-1:8080"},
                "annotations": {"summary": "error rate above 5%"},
                "startsAt": "2024-05-01T12:00:00.123Z",
                "endsAt": "0001-01-01T00:00:00Z",
                "generatorURL": "http://prometheus:9090/graph?g0.expr=rate%28http_errors_total%5B5m%5D%29+%3E+0.05&g0.tab=1",
                "fingerprint": "a1b2c3"
            }
        ]
    }"#;

    fn hook_alert(generator_url: &str) -> HookAlert {
        HookAlert {
            status: "firing".to_string(),
            labels: Labels::new(),
            annotations: Labels::new(),
            starts_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            ends_at: Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).unwrap(),
            generator_url: generator_url.to_string(),
            fingerprint: String::new(),
        }
    }

    #[test]
    fn decodes_alertmanager_payload() {
        let message: HookMessage = serde_json::from_str(PAYLOAD).unwrap();
        assert_eq!(message.version, "4");
        assert_eq!(message.status, "firing");
        assert_eq!(message.group_labels["alertname"], "HighErrorRate");
        assert_eq!(message.external_url, "http://alertmanager:9093");
        assert_eq!(message.alerts.len(), 1);

        let alert = &message.alerts[0];
        assert_eq!(alert.labels["instance"], "api-1:8080");
        assert!(alert.ends_at < alert.starts_at);
        assert_eq!(
            alert.generator_expression().unwrap(),
            "rate(http_errors_total[5m]) > 0.05"
        );
    }

    #[test]
    fn to_alert_copies_fields() {
        let message: HookMessage = serde_json::from_str(PAYLOAD).unwrap();
        let alert = message.alerts[0].to_alert().unwrap();
        assert_eq!(alert.generator_expression, "rate(http_errors_total[5m]) > 0.05");
        assert_eq!(alert.summary(), "error rate above 5%");
        assert_eq!(alert.labels.len(), 3);
    }

    #[test]
    fn minimal_alert_decodes() {
        let json = r#"{"alerts": [{"startsAt": "2024-05-01T12:00:00Z"}]}"#;
        let message: HookMessage = serde_json::from_str(json).unwrap();
        assert!(message.alerts[0].generator_url.is_empty());
    }

    #[test_case("http://prometheus:9090/graph?g0.tab=1" ; "missing parameter")]
    #[test_case("http://prometheus:9090/graph?g0.expr=" ; "empty parameter")]
    #[test_case("not a url" ; "unparseable url")]
    #[test_case("" ; "empty url")]
    fn expression_errors(url: &str) {
        assert!(matches!(
            hook_alert(url).generator_expression(),
            Err(PipelineError::Payload(_))
        ));
    }

    #[test]
    fn first_expression_wins() {
        let alert = hook_alert("http://p/graph?g0.expr=up+%3C+1&g0.expr=down");
        assert_eq!(alert.generator_expression().unwrap(), "up < 1");
    }
}
