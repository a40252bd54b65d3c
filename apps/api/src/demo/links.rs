//! Deep links into the experiment UI for the walkthrough pages.

use serde::Serialize;

use crate::config::{DemoLinks, NOTEBOOK_NAMES};

pub const NOT_FOUND: &str = "NOT FOUND";

const FAILED_TRACES_FILTER: &str =
    "filter=TAG%3A%3A%3D%3A%3Ayes%3A%3Aeval_example&filter=ASSESSMENT%3A%3A%3D%3A%3Ano%3A%3Aaccuracy";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExperimentInfo {
    pub experiment_id: String,
    pub link: String,
    pub trace_url_template: String,
    pub failed_traces_url: String,
    pub eval_dataset_url: String,
    pub monitoring_url: String,
}

/// Artifacts produced by the setup scripts. Fields are `null` when the
/// corresponding variable was never set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreloadedResults {
    pub low_accuracy_results_url: Option<String>,
    pub regression_results_url: Option<String>,
    pub metrics_result_url: Option<String>,
    pub sample_trace_url: Option<String>,
    pub sample_labeling_session_url: Option<String>,
    pub sample_review_app_url: Option<String>,
    pub sample_labeling_trace_id: Option<String>,
    pub sample_labeling_trace_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotebookUrl {
    pub notebook_name: String,
    pub url: String,
}

/// Builds experiment URLs under `{host}/ml/experiments/{id}`.
#[derive(Debug, Clone)]
pub struct ExperimentLinks<'a> {
    host: &'a str,
    experiment_id: &'a str,
}

impl<'a> ExperimentLinks<'a> {
    pub fn new(host: &'a str, experiment_id: &'a str) -> Self {
        Self {
            host,
            experiment_id,
        }
    }

    fn base(&self) -> String {
        format!("{}/ml/experiments/{}", self.host, self.experiment_id)
    }

    pub fn trace_url(&self, trace_id: &str) -> String {
        format!("{}/traces?selectedEvaluationId={trace_id}", self.base())
    }

    pub fn labeling_session_url(&self, session_id: &str) -> String {
        format!(
            "{}/labeling-sessions?selectedLabelingSessionId={session_id}",
            self.base()
        )
    }

    pub fn experiment_info(&self) -> ExperimentInfo {
        let base = self.base();
        ExperimentInfo {
            experiment_id: self.experiment_id.to_string(),
            link: format!("{base}?compareRunsMode=TRACES"),
            trace_url_template: self.trace_url(""),
            failed_traces_url: format!("{base}/traces?&{FAILED_TRACES_FILTER}"),
            eval_dataset_url: format!("{base}/datasets"),
            monitoring_url: format!("{base}/evaluation-monitoring"),
        }
    }

    pub fn preloaded_results(&self, links: &DemoLinks) -> PreloadedResults {
        let sample_trace_url = links.sample_trace_id.as_deref().map(|id| self.trace_url(id));
        PreloadedResults {
            low_accuracy_results_url: links.low_accuracy_results_url.clone(),
            regression_results_url: links.regression_results_url.clone(),
            metrics_result_url: sample_trace_url.clone(),
            sample_trace_url,
            sample_labeling_session_url: links
                .sample_labeling_session_id
                .as_deref()
                .map(|id| self.labeling_session_url(id)),
            sample_review_app_url: links.sample_review_app_url.clone(),
            sample_labeling_trace_id: links.sample_labeling_trace_id.clone(),
            sample_labeling_trace_url: links
                .sample_labeling_trace_id
                .as_deref()
                .map(|id| self.trace_url(id)),
        }
    }
}

/// Unknown notebook names and unset URLs both resolve to `NOT FOUND`.
pub fn notebook_url(links: &DemoLinks, name: &str) -> NotebookUrl {
    let url = NOTEBOOK_NAMES
        .contains(&name)
        .then(|| links.notebook_urls.get(name))
        .flatten()
        .cloned()
        .unwrap_or_else(|| NOT_FOUND.to_string());
    NotebookUrl {
        notebook_name: name.to_string(),
        url,
    }
}
