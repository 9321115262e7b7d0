//! Runs the search behind a conditional reference and applies the
//! exactly-one-match policy.

use super::{SearchMatch, SearchOutcome, SearchRequest, SearchSubsystem, UnsupportedParam};
use crate::cache::ResolvedReference;
use crate::cancel::CancellationToken;
use crate::parser::ConditionalExpression;
use crate::Result;
use std::sync::Arc;

/// Two results are enough to tell "exactly one" from "many".
const MATCH_LIMIT: usize = 2;

/// Result/paging controls that must not influence which resource a reference
/// resolves to.
const RESULT_CONTROL_PARAMS: &[&str] = &[
    "_count",
    "_offset",
    "_sort",
    "_include",
    "_revinclude",
    "_summary",
    "_elements",
    "_format",
    "_pretty",
    "_total",
    "_cursor",
    "_cursor_direction",
    "_maxresults",
    "_contained",
    "_containedType",
];

#[derive(Clone)]
pub struct SearchDispatcher {
    search: Arc<dyn SearchSubsystem>,
    strict_search_parameters: bool,
}

impl SearchDispatcher {
    pub fn new(search: Arc<dyn SearchSubsystem>, strict_search_parameters: bool) -> Self {
        Self {
            search,
            strict_search_parameters,
        }
    }

    /// Issue one search for `expr`. Cancellation aborts before or during the call.
    pub async fn dispatch(
        &self,
        expr: &ConditionalExpression,
        cancel: &CancellationToken,
    ) -> Result<SearchOutcome> {
        let request = build_search_request(expr);
        if request.params.is_empty() {
            return Err(crate::Error::InvalidReference(format!(
                "Conditional reference '{}' has no search criteria besides result parameters",
                expr.original
            )));
        }

        if cancel.is_cancelled() {
            return Err(crate::Error::Cancelled);
        }

        tracing::debug!(
            resource_type = %request.resource_type,
            params = ?request.params,
            "Dispatching conditional reference search"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(crate::Error::Cancelled),
            outcome = self.search.search(&request) => Ok(outcome?),
        }
    }

    /// Resolve `expr` to the single resource it identifies.
    pub async fn resolve(
        &self,
        expr: &ConditionalExpression,
        cancel: &CancellationToken,
    ) -> Result<ResolvedReference> {
        let outcome = self.dispatch(expr, cancel).await?;
        self.check_unsupported_params(expr, &outcome.unsupported_params)?;
        resolved_reference_from_matches(expr, &outcome.matches)
    }

    fn check_unsupported_params(
        &self,
        expr: &ConditionalExpression,
        unsupported: &[UnsupportedParam],
    ) -> Result<()> {
        if unsupported.is_empty() {
            return Ok(());
        }

        let params = unsupported
            .iter()
            .map(|p| format!("{} ({})", p.name, p.reason))
            .collect::<Vec<_>>()
            .join(", ");

        if self.strict_search_parameters {
            return Err(crate::Error::UnsupportedSearchParameters {
                reference: expr.original.clone(),
                params,
            });
        }

        tracing::warn!(
            reference = %expr.original,
            unsupported = %params,
            "Search ignored unsupported parameters in conditional reference"
        );
        Ok(())
    }
}

fn build_search_request(expr: &ConditionalExpression) -> SearchRequest {
    let params = expr
        .params
        .iter()
        .filter(|(name, _)| !is_result_control_param(name))
        .cloned()
        .collect();

    SearchRequest {
        resource_type: expr.resource_type.clone(),
        params,
        count: Some(MATCH_LIMIT),
    }
}

fn is_result_control_param(name: &str) -> bool {
    RESULT_CONTROL_PARAMS.contains(&name)
        || name.starts_with("_include:")
        || name.starts_with("_revinclude:")
}

fn resolved_reference_from_matches(
    expr: &ConditionalExpression,
    matches: &[SearchMatch],
) -> Result<ResolvedReference> {
    match matches {
        [only] => Ok(ResolvedReference::new(&only.resource_type, &only.id)),
        _ => {
            tracing::debug!(
                reference = %expr.original,
                matches = matches.len(),
                "Conditional reference did not resolve to exactly one resource"
            );
            Err(crate::Error::ReferenceNotResolved {
                reference: expr.original.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct Scripted {
        outcome: SearchOutcome,
        seen: Mutex<Vec<SearchRequest>>,
    }

    #[async_trait]
    impl SearchSubsystem for Scripted {
        async fn search(
            &self,
            request: &SearchRequest,
        ) -> std::result::Result<SearchOutcome, SearchError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.outcome.clone())
        }
    }

    fn patient(id: &str) -> SearchMatch {
        SearchMatch::from_resource(json!({ "resourceType": "Patient", "id": id })).unwrap()
    }

    fn expr(params: &[(&str, &str)]) -> ConditionalExpression {
        ConditionalExpression {
            resource_type: "Patient".to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            fragment: None,
            original: "Patient?identifier=12345".to_string(),
        }
    }

    fn scripted_dispatcher(
        outcome: SearchOutcome,
        strict: bool,
    ) -> (SearchDispatcher, Arc<Scripted>) {
        let search = Arc::new(Scripted {
            outcome,
            seen: Mutex::new(Vec::new()),
        });
        (SearchDispatcher::new(search.clone(), strict), search)
    }

    #[tokio::test]
    async fn strips_result_controls_and_limits_to_two() {
        let (dispatcher, search) = scripted_dispatcher(
            SearchOutcome {
                matches: vec![patient("123")],
                unsupported_params: vec![],
            },
            false,
        );

        let resolved = dispatcher
            .resolve(
                &expr(&[("identifier", "12345"), ("_count", "50"), ("_sort", "name")]),
                &CancellationToken::none(),
            )
            .await
            .unwrap();
        assert_eq!(resolved, ResolvedReference::new("Patient", "123"));

        let seen = search.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0].params,
            vec![("identifier".to_string(), "12345".to_string())]
        );
        assert_eq!(seen[0].count, Some(2));
    }

    #[tokio::test]
    async fn only_result_controls_is_rejected_without_search() {
        let (dispatcher, search) = scripted_dispatcher(SearchOutcome::default(), false);
        let err = dispatcher
            .resolve(&expr(&[("_count", "1")]), &CancellationToken::none())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::InvalidReference(_)));
        assert!(search.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_and_many_matches_share_one_error() {
        for matches in [vec![], vec![patient("123"), patient("123")]] {
            let (dispatcher, _) = scripted_dispatcher(
                SearchOutcome {
                    matches,
                    unsupported_params: vec![],
                },
                false,
            );
            let err = dispatcher
                .resolve(&expr(&[("identifier", "12345")]), &CancellationToken::none())
                .await
                .unwrap_err();
            assert_eq!(
                err.to_string(),
                "Given conditional reference 'Patient?identifier=12345' does not resolve to a resource."
            );
        }
    }

    #[tokio::test]
    async fn unsupported_params_fail_only_in_strict_mode() {
        let outcome = SearchOutcome {
            matches: vec![patient("1")],
            unsupported_params: vec![UnsupportedParam {
                name: "foo".to_string(),
                reason: "unknown search parameter".to_string(),
            }],
        };

        let (lenient, _) = scripted_dispatcher(outcome.clone(), false);
        assert!(lenient
            .resolve(&expr(&[("foo", "bar")]), &CancellationToken::none())
            .await
            .is_ok());

        let (strict, _) = scripted_dispatcher(outcome, true);
        let err = strict
            .resolve(&expr(&[("foo", "bar")]), &CancellationToken::none())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::UnsupportedSearchParameters { .. }));
    }

    #[tokio::test]
    async fn cancelled_token_skips_search() {
        let (dispatcher, search) = scripted_dispatcher(SearchOutcome::default(), false);
        let (handle, token) = CancellationToken::new();
        handle.cancel();

        let err = dispatcher
            .resolve(&expr(&[("identifier", "1")]), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::Cancelled));
        assert!(search.seen.lock().unwrap().is_empty());
    }
}
