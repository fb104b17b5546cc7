#![forbid(unsafe_code)]

//! Merge-status response bodies.
//!
//! A body may carry `vetoes`, `errors`, or both. A non-empty `errors` list
//! always wins: the fetch is reported as [`FetchError::Remote`] even when
//! vetoes came along with it.

use prb_core::{BlockerRecord, FetchError, RemoteError, Veto};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct MergeStatusBody {
    #[serde(default)]
    vetoes: Option<Vec<Veto>>,
    #[serde(default)]
    errors: Vec<RemoteError>,
}

/// Decode a merge-status body, independent of the HTTP status.
pub fn decode_merge_status(body: &[u8]) -> Result<BlockerRecord, FetchError> {
    let parsed: MergeStatusBody =
        serde_json::from_slice(body).map_err(|err| FetchError::decode(err.to_string()))?;
    if !parsed.errors.is_empty() {
        return Err(FetchError::remote(parsed.errors));
    }
    parsed
        .vetoes
        .map(BlockerRecord::new)
        .ok_or_else(|| FetchError::decode("body has neither vetoes nor errors"))
}

/// Decode a complete response.
///
/// Remote errors are surfaced whatever the status. Otherwise a non-success
/// status is reported as [`FetchError::Status`], even if the body happens to
/// parse.
pub fn decode_response(status: u16, body: &[u8]) -> Result<BlockerRecord, FetchError> {
    let success = (200..300).contains(&status);
    match decode_merge_status(body) {
        Err(remote @ FetchError::Remote { .. }) => Err(remote),
        Ok(record) if success => Ok(record),
        Err(err) if success => Err(err),
        _ => Err(FetchError::Status { status }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn single_veto() {
        let record =
            decode_merge_status(br#"{"vetoes":[{"detailedMessage":"needs approval"}]}"#)
                .unwrap();
        assert_eq!(record.count(), 1);
        assert_eq!(record.messages().collect::<Vec<_>>(), vec!["needs approval"]);
    }

    #[test]
    fn empty_vetoes_is_clear() {
        let record = decode_merge_status(br#"{"canMerge":true,"vetoes":[]}"#).unwrap();
        assert_eq!(record, BlockerRecord::clear());
    }

    #[test]
    fn errors_list_becomes_remote_failure() {
        let err = decode_merge_status(br#"{"errors":[{"message":"boom"}]}"#).unwrap_err();
        assert_eq!(err, FetchError::remote(vec![RemoteError::new("boom")]));
        assert_eq!(err.causes(), vec!["boom".to_string()]);
    }

    #[test]
    fn errors_win_over_vetoes() {
        let err = decode_merge_status(
            br#"{"vetoes":[{"detailedMessage":"x"}],"errors":[{"message":"a"},{"message":"b","exceptionName":"E"}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.causes(), vec!["a".to_string(), "b (E)".to_string()]);
    }

    #[test]
    fn missing_vetoes_is_a_decode_error() {
        let err = decode_merge_status(br#"{"canMerge":true}"#).unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = decode_merge_status(b"<html>login</html>").unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[test]
    fn non_success_without_errors_is_status() {
        assert_eq!(
            decode_response(404, b"<html>not found</html>"),
            Err(FetchError::Status { status: 404 })
        );
        assert_eq!(
            decode_response(500, br#"{"vetoes":[]}"#),
            Err(FetchError::Status { status: 500 })
        );
    }

    #[test]
    fn non_success_with_errors_is_remote() {
        let err = decode_response(
            404,
            br#"{"errors":[{"context":null,"message":"Pull request 9 does not exist","exceptionName":"com.atlassian.bitbucket.pull.NoSuchPullRequestException"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::Remote { ref errors } if errors.len() == 1));
    }

    #[test]
    fn success_body_is_decoded() {
        let record = decode_response(
            200,
            br#"{"vetoes":[{"summaryMessage":"s","detailedMessage":"one"},{"detailedMessage":"two"}]}"#,
        )
        .unwrap();
        assert_eq!(record.count(), 2);
    }
}
