//! Chart, table and scanned-page analysis with a multimodal model.

use super::{tool_error, Tool};
use base64::Engine;
use finagent_core::AppResult;
use finagent_llm::{ChatMessage, LlmClient, LlmRequest};
use finagent_prompt::{build_prompt, load_prompt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const VISION_MAX_TOKENS: u32 = 1000;

/// Kind of analysis requested for an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisType {
    #[default]
    General,
    Chart,
    Table,
    ExtractData,
}

impl AnalysisType {
    /// Unknown names fall back to `General`.
    pub fn parse(s: &str) -> Self {
        match s {
            "chart" => Self::Chart,
            "table" => Self::Table,
            "extract_data" => Self::ExtractData,
            _ => Self::General,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Chart => "chart",
            Self::Table => "table",
            Self::ExtractData => "extract_data",
        }
    }

    fn prompt_id(&self) -> String {
        format!("vision.{}", self.as_str())
    }
}

/// Sends images to the vision deployment.
pub struct VisionAnalyzer {
    llm: Arc<dyn LlmClient>,
    vision_model: String,
    chat_model: String,
    workspace: PathBuf,
}

impl VisionAnalyzer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        vision_model: impl Into<String>,
        chat_model: impl Into<String>,
        workspace: impl Into<PathBuf>,
    ) -> Self {
        Self {
            llm,
            vision_model: vision_model.into(),
            chat_model: chat_model.into(),
            workspace: workspace.into(),
        }
    }

    /// Analyze one image. Failures are returned as `{"error", "success": false}`.
    #[tracing::instrument(name = "analyze_image", skip_all, fields(image = %image_path.display(), analysis_type = analysis_type.as_str()))]
    pub async fn analyze_image(
        &self,
        image_path: &Path,
        query: Option<&str>,
        analysis_type: AnalysisType,
    ) -> Value {
        if !image_path.exists() {
            return tool_error(format!("Image not found: {}", image_path.display()));
        }

        match self.request_analysis(image_path, query, analysis_type).await {
            Ok(analysis) => json!({
                "analysis": analysis,
                "image_path": image_path.display().to_string(),
                "analysis_type": analysis_type.as_str(),
                "success": true,
            }),
            Err(e) => {
                tracing::error!("Vision analysis error: {}", e);
                tool_error(e.to_string())
            }
        }
    }

    async fn request_analysis(
        &self,
        image_path: &Path,
        query: Option<&str>,
        analysis_type: AnalysisType,
    ) -> AppResult<String> {
        let bytes = tokio::fs::read(image_path).await?;
        let data_url = format!(
            "data:{};base64,{}",
            mime_type(image_path),
            base64::engine::general_purpose::STANDARD.encode(bytes)
        );

        let mut variables = HashMap::new();
        if let Some(query) = query.filter(|q| !q.trim().is_empty()) {
            variables.insert("query".to_string(), query.to_string());
        }
        let definition = load_prompt(&self.workspace, &analysis_type.prompt_id())?;
        let prompt = build_prompt(&definition, variables)?;

        let request = LlmRequest::from_messages(
            vec![ChatMessage::user(prompt.user).with_image(data_url)],
            self.vision_model.clone(),
        )
        .with_max_tokens(VISION_MAX_TOKENS);

        let response = self.llm.complete(&request).await?;
        Ok(response.content)
    }

    /// Extract data from every image, then compare the extractions.
    pub async fn analyze_multiple_images(
        &self,
        image_paths: &[PathBuf],
        comparison_query: Option<&str>,
    ) -> Value {
        let mut analyses = Vec::with_capacity(image_paths.len());
        for path in image_paths {
            analyses.push(
                self.analyze_image(path, comparison_query, AnalysisType::ExtractData)
                    .await,
            );
        }

        if !analyses.iter().all(|a| a["success"] == true) {
            return json!({
                "individual_analyses": analyses,
                "error": "Some analyses failed",
                "success": false,
            });
        }

        match self.compare(&analyses, comparison_query).await {
            Ok(comparison) => json!({
                "individual_analyses": analyses,
                "comparison": comparison,
                "success": true,
            }),
            Err(e) => json!({
                "individual_analyses": analyses,
                "error": format!("Comparison failed: {}", e),
                "success": false,
            }),
        }
    }

    async fn compare(&self, analyses: &[Value], query: Option<&str>) -> AppResult<String> {
        let summaries: Vec<String> = analyses
            .iter()
            .enumerate()
            .map(|(i, analysis)| {
                let name = analysis["image_path"]
                    .as_str()
                    .and_then(|p| Path::new(p).file_name())
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                format!(
                    "Image {} ({}):\n{}\n",
                    i + 1,
                    name,
                    analysis["analysis"].as_str().unwrap_or_default()
                )
            })
            .collect();

        let mut variables = HashMap::new();
        variables.insert("summaries".to_string(), summaries.join("\n"));
        if let Some(query) = query {
            variables.insert("query".to_string(), query.to_string());
        }
        let definition = load_prompt(&self.workspace, "vision.comparison")?;
        let prompt = build_prompt(&definition, variables)?;

        let request = LlmRequest::new(prompt.user, self.chat_model.clone())
            .with_temperature(0.1)
            .with_max_tokens(VISION_MAX_TOKENS);
        Ok(self.llm.complete(&request).await?.content)
    }
}

/// MIME type for an image file, from its extension.
pub fn mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        _ => "image/jpeg",
    }
}

/// `analyze_financial_image`
pub struct VisionTool {
    analyzer: Arc<VisionAnalyzer>,
}

impl VisionTool {
    pub fn new(analyzer: Arc<VisionAnalyzer>) -> Self {
        Self { analyzer }
    }
}

#[async_trait::async_trait]
impl Tool for VisionTool {
    fn name(&self) -> &str {
        "analyze_financial_image"
    }

    fn description(&self) -> &str {
        "Analyze financial charts, graphs, tables, or scanned documents using vision AI. \
         Extracts data from charts and graphs, reads tables and statements from images and \
         analyzes trends in visual data. Use this when the user asks about charts, provides \
         images, or needs to extract data from visual content."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "image_path": {
                    "type": "string",
                    "description": "Path to the image file",
                },
                "query": {
                    "type": "string",
                    "description": "Specific question about the image",
                },
                "analysis_type": {
                    "type": "string",
                    "enum": ["general", "chart", "table", "extract_data"],
                    "description": "Type of analysis (default general)",
                },
            },
            "required": ["image_path"],
        })
    }

    async fn execute(&self, args: Value) -> AppResult<Value> {
        let Some(image_path) = args.get("image_path").and_then(Value::as_str) else {
            return Ok(tool_error("Missing required parameter 'image_path'"));
        };
        let query = args.get("query").and_then(Value::as_str);
        let analysis_type = args
            .get("analysis_type")
            .and_then(Value::as_str)
            .map(AnalysisType::parse)
            .unwrap_or_default();

        Ok(self
            .analyzer
            .analyze_image(Path::new(image_path), query, analysis_type)
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finagent_llm::ScriptedClient;
    use tempfile::TempDir;

    fn analyzer(client: &Arc<ScriptedClient>, dir: &TempDir) -> VisionAnalyzer {
        let llm: Arc<dyn LlmClient> = client.clone();
        VisionAnalyzer::new(llm, "gpt-4o", "gpt-4", dir.path())
    }

    #[test]
    fn test_analysis_type_parsing() {
        assert_eq!(AnalysisType::parse("chart"), AnalysisType::Chart);
        assert_eq!(AnalysisType::parse("extract_data"), AnalysisType::ExtractData);
        assert_eq!(AnalysisType::parse("3d"), AnalysisType::General);
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(mime_type(Path::new("a.PNG")), "image/png");
        assert_eq!(mime_type(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(mime_type(Path::new("scan")), "image/jpeg");
    }

    #[tokio::test]
    async fn test_analyze_image_sends_prompt_and_image() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("revenue.png");
        std::fs::write(&image, b"PNG").unwrap();
        let client = Arc::new(ScriptedClient::new().push_text("Revenue rises each quarter"));

        let result = analyzer(&client, &dir)
            .analyze_image(&image, Some("What is the trend?"), AnalysisType::Chart)
            .await;

        assert_eq!(result["success"], true);
        assert_eq!(result["analysis"], "Revenue rises each quarter");
        assert_eq!(result["analysis_type"], "chart");

        let request = &client.requests()[0];
        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.max_tokens, Some(1000));
        let message = &request.messages[0];
        assert!(message.content.starts_with("Analyze this financial chart or graph."));
        assert!(message.content.ends_with("\n\nSpecific question: What is the trend?"));
        assert_eq!(message.images, vec!["data:image/png;base64,UE5H".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_image() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(ScriptedClient::new());
        let missing = dir.path().join("missing.jpg");

        let result = analyzer(&client, &dir)
            .analyze_image(&missing, None, AnalysisType::General)
            .await;

        assert_eq!(result["success"], false);
        assert_eq!(
            result["error"],
            format!("Image not found: {}", missing.display())
        );
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_llm_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("chart.jpg");
        std::fs::write(&image, b"JPG").unwrap();
        let client = Arc::new(ScriptedClient::new());

        let result = analyzer(&client, &dir)
            .analyze_image(&image, None, AnalysisType::General)
            .await;
        assert_eq!(result["success"], false);
    }

    #[tokio::test]
    async fn test_analyze_multiple_images() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("q3.png");
        let b = dir.path().join("q4.png");
        std::fs::write(&a, b"A").unwrap();
        std::fs::write(&b, b"B").unwrap();
        let client = Arc::new(
            ScriptedClient::new()
                .push_text("Revenue 5.2M")
                .push_text("Revenue 6.1M")
                .push_text("Revenue grew from 5.2M to 6.1M"),
        );

        let result = analyzer(&client, &dir)
            .analyze_multiple_images(&[a, b], Some("revenue"))
            .await;

        assert_eq!(result["success"], true);
        assert_eq!(result["comparison"], "Revenue grew from 5.2M to 6.1M");
        assert_eq!(result["individual_analyses"][0]["analysis_type"], "extract_data");

        let requests = client.requests();
        let comparison_prompt = &requests[2].messages[0].content;
        assert_eq!(requests[2].model, "gpt-4");
        assert!(comparison_prompt.contains("Image 1 (q3.png):\nRevenue 5.2M\n"));
        assert!(comparison_prompt.contains("Image 2 (q4.png):\nRevenue 6.1M\n"));
        assert!(comparison_prompt.contains("Focus on: revenue"));
    }

    #[tokio::test]
    async fn test_multiple_images_with_failure() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("q3.png");
        std::fs::write(&a, b"A").unwrap();
        let client = Arc::new(ScriptedClient::new().push_text("Revenue 5.2M"));

        let result = analyzer(&client, &dir)
            .analyze_multiple_images(&[a, dir.path().join("gone.png")], None)
            .await;

        assert_eq!(result["success"], false);
        assert_eq!(result["error"], "Some analyses failed");
        assert_eq!(result["individual_analyses"].as_array().unwrap().len(), 2);
    }
}
