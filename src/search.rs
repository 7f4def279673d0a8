//! Web search through SerpAPI's Google engine.

use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

const ORGANIC_SOURCE: &str = "Google 검색";
const ANSWER_BOX_SOURCE: &str = "Google 답변 박스";
const KNOWLEDGE_GRAPH_SOURCE: &str = "Google 지식 그래프";
const MAX_RESULTS: usize = 5;
const CITATION_GUIDE: &str =
    "반드시 각 정보의 출처를 [출처: 사이트명](URL) 형식으로 표기하세요. 예: [출처: 네이버](https://naver.com)";
pub const SIMULATED_NOTICE: &str =
    "검색 서비스에 일시적인 문제가 있어 시뮬레이션 데이터를 사용합니다.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub url: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectAnswer {
    pub answer: String,
    pub source: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeInfo {
    pub title: String,
    pub description: String,
    pub source: String,
}

/// Everything one search produced. `error` is set when the results are
/// simulated stand-ins rather than live data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub query: String,
    pub timestamp: DateTime<Utc>,
    pub results: Vec<SearchResult>,
    pub direct_answer: Option<DirectAnswer>,
    pub knowledge_info: Option<KnowledgeInfo>,
    pub total_results: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchOutcome {
    pub fn is_simulated(&self) -> bool {
        self.error.is_some()
    }

    /// JSON document handed back to the model as the `web_search` tool result.
    pub fn to_tool_payload(&self) -> String {
        let payload = ToolPayload {
            query: &self.query,
            timestamp: self.timestamp,
            total_results: self.total_results,
            direct_answer: self.direct_answer.as_ref(),
            knowledge_info: self.knowledge_info.as_ref(),
            search_results: self
                .results
                .iter()
                .enumerate()
                .map(|(index, result)| RankedResult {
                    rank: index + 1,
                    title: &result.title,
                    snippet: &result.snippet,
                    url: &result.url,
                    source: &result.source,
                    display_url: display_host(&result.url),
                })
                .collect(),
            citation_guide: CITATION_GUIDE,
        };
        serde_json::to_string_pretty(&payload).unwrap_or_default()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolPayload<'a> {
    query: &'a str,
    timestamp: DateTime<Utc>,
    total_results: u64,
    direct_answer: Option<&'a DirectAnswer>,
    knowledge_info: Option<&'a KnowledgeInfo>,
    search_results: Vec<RankedResult<'a>>,
    citation_guide: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RankedResult<'a> {
    rank: usize,
    title: &'a str,
    snippet: &'a str,
    url: &'a str,
    source: &'a str,
    display_url: String,
}

fn display_host(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .unwrap_or_default()
}

// SerpAPI response subset.
#[derive(Debug, Default, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Vec<SerpOrganic>,
    answer_box: Option<SerpAnswerBox>,
    knowledge_graph: Option<SerpKnowledgeGraph>,
    search_information: Option<SerpSearchInformation>,
}

#[derive(Debug, Deserialize)]
struct SerpOrganic {
    title: Option<String>,
    snippet: Option<String>,
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerpAnswerBox {
    answer: Option<String>,
    snippet: Option<String>,
    title: Option<String>,
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerpKnowledgeGraph {
    title: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerpSearchInformation {
    total_results: Option<u64>,
}

/// Client for the search provider.
#[derive(Debug, Clone)]
pub struct WebSearch {
    http: Client,
    endpoint: String,
    api_key: String,
}

impl WebSearch {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    /// Runs `query`. Never fails: on any error the outcome carries simulated
    /// results and an `error` notice instead.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> SearchOutcome {
        match self.fetch(query).await {
            Ok(outcome) => {
                debug!(results = outcome.results.len(), "Search completed");
                outcome
            }
            Err(e) => {
                warn!(error = %e, "Search provider failed, using simulated results");
                simulated_outcome(query)
            }
        }
    }

    async fn fetch(&self, query: &str) -> anyhow::Result<SearchOutcome> {
        let response = self
            .http
            .get(&self.endpoint)
            .header(reqwest::header::USER_AGENT, "ChatBot-UI/1.0")
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("api_key", self.api_key.as_str()),
                ("num", "5"),
                ("hl", "ko"),
                ("gl", "kr"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("SerpAPI request failed: {}", response.status());
        }

        let data: SerpResponse = response.json().await?;
        Ok(parse_response(query, data))
    }
}

fn parse_response(query: &str, data: SerpResponse) -> SearchOutcome {
    let results = data
        .organic_results
        .into_iter()
        .take(MAX_RESULTS)
        .map(|result| SearchResult {
            title: result.title.unwrap_or_default(),
            snippet: result.snippet.unwrap_or_default(),
            url: result.link.unwrap_or_default(),
            source: ORGANIC_SOURCE.to_string(),
        })
        .collect();

    let direct_answer = data.answer_box.map(|answer_box| DirectAnswer {
        answer: answer_box
            .answer
            .filter(|a| !a.is_empty())
            .or(answer_box.snippet)
            .unwrap_or_default(),
        source: answer_box
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| ANSWER_BOX_SOURCE.to_string()),
        url: answer_box.link.unwrap_or_default(),
    });

    let knowledge_info = data.knowledge_graph.map(|graph| KnowledgeInfo {
        title: graph.title.unwrap_or_default(),
        description: graph.description.unwrap_or_default(),
        source: KNOWLEDGE_GRAPH_SOURCE.to_string(),
    });

    SearchOutcome {
        query: query.to_string(),
        timestamp: Utc::now(),
        results,
        direct_answer,
        knowledge_info,
        total_results: data
            .search_information
            .and_then(|info| info.total_results)
            .unwrap_or(0),
        error: None,
    }
}

/// Appends `segment` as one percent-encoded path segment of `base`.
fn with_path_segment(base: &str, segment: &str) -> String {
    let Ok(mut url) = Url::parse(base) else {
        return base.to_string();
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(segment);
    }
    url.to_string()
}

fn with_query_param(base: &str, key: &str, value: &str) -> String {
    Url::parse_with_params(base, &[(key, value)])
        .map(String::from)
        .unwrap_or_else(|_| base.to_string())
}

fn simulated_outcome(query: &str) -> SearchOutcome {
    let results = vec![
        SearchResult {
            title: format!("{} - 네이버 지도 검색 결과", query),
            snippet: format!(
                "{}에 대한 상세 정보를 네이버 지도에서 확인할 수 있습니다. 위치, 영업시간, 리뷰 등의 정보가 제공됩니다.",
                query
            ),
            url: with_path_segment("https://map.naver.com/search", query),
            source: "네이버 지도".to_string(),
        },
        SearchResult {
            title: format!("{} 관련 블로그 후기", query),
            snippet: format!(
                "{}에 대한 실제 방문 후기와 리뷰를 확인할 수 있는 블로그 글입니다.",
                query
            ),
            url: with_query_param(
                "https://blog.naver.com/search/searchResult.naver",
                "query",
                query,
            ),
            source: "네이버 블로그".to_string(),
        },
        SearchResult {
            title: format!("{} - 다음 지도 정보", query),
            snippet: format!(
                "다음 지도에서 제공하는 {}의 상세 정보와 주변 시설 안내입니다.",
                query
            ),
            url: with_path_segment("https://map.daum.net/search", query),
            source: "다음 지도".to_string(),
        },
    ];

    SearchOutcome {
        query: query.to_string(),
        timestamp: Utc::now(),
        total_results: results.len() as u64,
        results,
        direct_answer: None,
        knowledge_info: None,
        error: Some(SIMULATED_NOTICE.to_string()),
    }
}
