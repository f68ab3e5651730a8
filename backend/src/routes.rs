use actix_multipart::Multipart;
use actix_web::{web, Error, HttpResponse};
use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use log::info;
use serde::Deserialize;
use serde_json::json;
use shared::{AnalysisMetadata, ComprehensiveResponse, OutputType, StakeholderReports};
use std::io::Write;
use uuid::Uuid;

use crate::pipeline::orchestrator::Pipeline;
use crate::pipeline::score::condition_score;
use crate::pipeline::stage::StageKind;
use crate::report::service::ReportService;

const MODEL_VERSION: &str = "v1.0";
const RAW_PLACEHOLDER_SCORE: u8 = 85;
const RAW_PLACEHOLDER_REPORT: &str =
    "Raw technical analysis - see technical_analysis for details";

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health)))
        .service(
            web::resource("/analyze")
                .route(web::get().to(analyze_info))
                .route(web::post().to(analyze)),
        )
        .service(
            web::resource("/analyze-comprehensive")
                .route(web::post().to(analyze_comprehensive)),
        )
        .service(web::resource("/damage_local").route(web::post().to(damage_local)))
        .service(web::resource("/damage_parts_local").route(web::post().to(damage_parts_local)))
        .service(
            web::resource("/damaged_windows_local").route(web::post().to(damaged_windows_local)),
        )
        .service(
            web::resource("/unified_windows_local").route(web::post().to(unified_windows_local)),
        )
        .service(web::resource("/scratch_dent_local").route(web::post().to(scratch_dent_local)))
        .service(
            web::resource("/tire_classification_local")
                .route(web::post().to(tire_classification_local)),
        )
        .service(web::resource("/dirty_local").route(web::post().to(dirty_local)));
}

fn device_name() -> &'static str {
    if tch::Cuda::is_available() {
        "cuda"
    } else {
        "cpu"
    }
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok", "device": device_name() }))
}

async fn analyze_info() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "ok": true,
        "endpoint": "analyze",
        "method": "POST expected with form 'image'"
    }))
}

/// Read the first non-empty multipart field as the uploaded image.
async fn read_image(mut payload: Multipart) -> Result<Vec<u8>, Error> {
    while let Ok(Some(mut field)) = payload.try_next().await {
        let mut image_data = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk?;
            image_data.write_all(&data)?;
        }
        if !image_data.is_empty() {
            return Ok(image_data);
        }
    }
    Err(actix_web::error::ErrorBadRequest(
        "multipart field 'image' is required",
    ))
}

async fn analyze(pipeline: web::Data<Pipeline>, payload: Multipart) -> Result<HttpResponse, Error> {
    let image = read_image(payload).await?;
    let analysis = pipeline.run(&image).await;
    Ok(HttpResponse::Ok().json(analysis.to_wire(pipeline.decision_threshold())))
}

#[derive(Deserialize)]
struct ComprehensiveQuery {
    #[serde(default)]
    output_type: OutputType,
}

fn metadata(output_type: OutputType, threshold: f32) -> AnalysisMetadata {
    AnalysisMetadata {
        analysis_id: Uuid::new_v4().to_string(),
        analysis_timestamp: Utc::now().to_rfc3339(),
        model_version: MODEL_VERSION.to_string(),
        output_type,
        confidence_threshold: threshold,
    }
}

async fn analyze_comprehensive(
    pipeline: web::Data<Pipeline>,
    reports: web::Data<ReportService>,
    query: web::Query<ComprehensiveQuery>,
    payload: Multipart,
) -> Result<HttpResponse, Error> {
    let image = read_image(payload).await?;
    let analysis = pipeline.run(&image).await;
    let threshold = pipeline.decision_threshold();
    let technical_analysis = analysis.to_wire(threshold);

    let response = match query.output_type {
        OutputType::Raw => ComprehensiveResponse {
            technical_analysis,
            condition_score: RAW_PLACEHOLDER_SCORE,
            reports: StakeholderReports {
                driver: RAW_PLACEHOLDER_REPORT.to_string(),
                passenger: RAW_PLACEHOLDER_REPORT.to_string(),
                business: RAW_PLACEHOLDER_REPORT.to_string(),
            },
            recommendations: Vec::new(),
            metadata: metadata(OutputType::Raw, threshold),
            diagnostic: None,
        },
        OutputType::Structured => {
            let score = condition_score(&analysis);
            let bundle = reports.generate(&analysis, score).await;
            ComprehensiveResponse {
                technical_analysis,
                condition_score: score,
                reports: bundle.reports,
                recommendations: bundle.recommendations,
                metadata: metadata(OutputType::Structured, threshold),
                diagnostic: bundle.diagnostic,
            }
        }
    };

    info!("Comprehensive analysis produced ({} output)", query.output_type);
    Ok(HttpResponse::Ok().json(response))
}

async fn run_single(
    pipeline: &Pipeline,
    kind: StageKind,
    payload: Multipart,
) -> Result<HttpResponse, Error> {
    let image = read_image(payload).await?;
    let analysis = pipeline.run_standalone(kind, &image).await;
    let outcome = analysis
        .slot(kind)
        .map(|result| result.to_wire(kind.spec(), pipeline.decision_threshold()));
    Ok(HttpResponse::Ok().json(outcome))
}

async fn damage_local(
    pipeline: web::Data<Pipeline>,
    payload: Multipart,
) -> Result<HttpResponse, Error> {
    run_single(&pipeline, StageKind::Damage, payload).await
}

async fn damage_parts_local(
    pipeline: web::Data<Pipeline>,
    payload: Multipart,
) -> Result<HttpResponse, Error> {
    run_single(&pipeline, StageKind::DamageParts, payload).await
}

async fn damaged_windows_local(
    pipeline: web::Data<Pipeline>,
    payload: Multipart,
) -> Result<HttpResponse, Error> {
    run_single(&pipeline, StageKind::DamagedWindows, payload).await
}

async fn unified_windows_local(
    pipeline: web::Data<Pipeline>,
    payload: Multipart,
) -> Result<HttpResponse, Error> {
    run_single(&pipeline, StageKind::UnifiedWindows, payload).await
}

async fn scratch_dent_local(
    pipeline: web::Data<Pipeline>,
    payload: Multipart,
) -> Result<HttpResponse, Error> {
    run_single(&pipeline, StageKind::DamageType, payload).await
}

async fn tire_classification_local(
    pipeline: web::Data<Pipeline>,
    payload: Multipart,
) -> Result<HttpResponse, Error> {
    run_single(&pipeline, StageKind::TireCondition, payload).await
}

async fn dirty_local(
    pipeline: web::Data<Pipeline>,
    payload: Multipart,
) -> Result<HttpResponse, Error> {
    run_single(&pipeline, StageKind::Cleanliness, payload).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::inference::model::{Classifier, InferenceError, Prediction};
    use crate::inference::registry::ClassifierRegistry;
    use actix_web::{test, App};
    use std::sync::Arc;

    struct FixedClassifier {
        labels: Vec<String>,
        probs: Vec<f32>,
    }

    impl FixedClassifier {
        fn new(labels: &[&str], probs: &[f32]) -> Arc<dyn Classifier> {
            Arc::new(Self {
                labels: labels.iter().map(|l| l.to_string()).collect(),
                probs: probs.to_vec(),
            })
        }
    }

    impl Classifier for FixedClassifier {
        fn classify(&self, _image: &[u8]) -> Result<Prediction, InferenceError> {
            Ok(Prediction::from_probabilities(&self.labels, &self.probs))
        }
    }

    fn intact_dirty_registry() -> Arc<ClassifierRegistry> {
        let registry = ClassifierRegistry::new("missing-models", 224);
        registry.register(
            StageKind::Damage,
            FixedClassifier::new(&["damaged", "intact"], &[0.1, 0.9]),
        );
        registry.register(
            StageKind::Cleanliness,
            FixedClassifier::new(&["clean", "dirty"], &[0.2, 0.8]),
        );
        Arc::new(registry)
    }

    macro_rules! app_with {
        ($registry:expr) => {{
            let pipeline = Pipeline::new($registry, &PipelineConfig::default());
            let reports = ReportService::new(None);
            test::init_service(
                App::new()
                    .app_data(web::Data::new(pipeline))
                    .app_data(web::Data::new(reports))
                    .configure(configure_routes),
            )
            .await
        }};
    }

    fn multipart_image() -> (&'static str, Vec<u8>) {
        let boundary = "test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"image\"; \
                 filename=\"car.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n",
                boundary
            )
            .as_bytes(),
        );
        body.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0]);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
        (
            "multipart/form-data; boundary=test-boundary",
            body,
        )
    }

    #[actix_web::test]
    async fn analyze_returns_fixed_wire_fields() {
        let app = app_with!(intact_dirty_registry());
        let (content_type, body) = multipart_image();
        let request = test::TestRequest::post()
            .uri("/analyze")
            .insert_header(("content-type", content_type))
            .set_payload(body)
            .to_request();

        let json: serde_json::Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(json["is_damaged"], serde_json::json!(false));
        assert_eq!(json["damage_source"], serde_json::json!("local"));
        assert_eq!(json["dirty"]["pred_label"], serde_json::json!("dirty"));
        assert_eq!(json["dirty"]["positive"], serde_json::json!(true));
        assert_eq!(json["damage_parts_local"], serde_json::Value::Null);
    }

    #[actix_web::test]
    async fn missing_checkpoint_gives_error_and_expected_shape() {
        let app = app_with!(Arc::new(ClassifierRegistry::new("missing-models", 224)));
        let (content_type, body) = multipart_image();
        let request = test::TestRequest::post()
            .uri("/dirty_local")
            .insert_header(("content-type", content_type))
            .set_payload(body)
            .to_request();

        let json: serde_json::Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(
            json["error"],
            serde_json::json!("Local checkpoint not found.")
        );
        assert!(json["expected"]
            .as_str()
            .unwrap()
            .ends_with("dirty_binary.pt"));
    }

    #[actix_web::test]
    async fn comprehensive_raw_short_circuits_reporting() {
        let app = app_with!(intact_dirty_registry());
        let (content_type, body) = multipart_image();
        let request = test::TestRequest::post()
            .uri("/analyze-comprehensive?output_type=raw")
            .insert_header(("content-type", content_type))
            .set_payload(body)
            .to_request();

        let json: serde_json::Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(json["condition_score"], serde_json::json!(85));
        assert_eq!(
            json["reports"]["driver"],
            serde_json::json!(RAW_PLACEHOLDER_REPORT)
        );
        assert_eq!(json["recommendations"], serde_json::json!([]));
        assert_eq!(json["metadata"]["output_type"], serde_json::json!("raw"));
    }

    #[actix_web::test]
    async fn comprehensive_structured_scores_and_reports() {
        let app = app_with!(intact_dirty_registry());
        let (content_type, body) = multipart_image();
        let request = test::TestRequest::post()
            .uri("/analyze-comprehensive")
            .insert_header(("content-type", content_type))
            .set_payload(body)
            .to_request();

        let json: serde_json::Value = test::call_and_read_body_json(&app, request).await;
        // Intact but dirty at 0.8: 100 - floor(20 * 0.8) = 84.
        assert_eq!(json["condition_score"], serde_json::json!(84));
        assert!(!json["reports"]["driver"].as_str().unwrap().is_empty());
        assert!(json["recommendations"].as_array().unwrap().len() <= 4);
        assert!(json["diagnostic"].as_str().unwrap().contains("not configured"));
    }
}
