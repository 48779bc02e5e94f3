use std::sync::Arc;

use bpjs_audit::{AuditLog, AuditStatus, InMemoryAuditLog};
use bpjs_client::{ApiClient, ApiResult, CredentialSet};
use bpjs_services::prescription::{
    DeleteDrug, DeletePrescription, PrescriptionListQuery, PrescriptionSubmission,
};
use bpjs_services::{PrescriptionService, PrescriptionSettings};
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NO_APOTIK: &str = "0112A01708250000001";

fn ok(response: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "metaData": {"code": "200", "message": "OK"},
        "response": response,
    }))
}

fn service(server: &MockServer, audit: Arc<InMemoryAuditLog>) -> PrescriptionService {
    let credentials = CredentialSet::new(server.uri(), "1234", "secret123", "user-key");
    let client = Arc::new(ApiClient::new(credentials).unwrap());
    let settings = PrescriptionSettings {
        pharmacy_provider_code: "0112A017".into(),
        ..Default::default()
    };
    PrescriptionService::new(client, audit, settings)
}

fn submission() -> PrescriptionSubmission {
    serde_json::from_value(json!({
        "KUNJUNGAN": "2508170001",
        "REFASALSJP": "0112R0010825V000001",
        "POLIRSP": "INT",
        "NORESEP": "R0001",
        "IDUSERSJP": "apoteker",
        "DETAIL": [
            {
                "ID": 501,
                "RACIKAN": 1,
                "JUMLAH": 10,
                "PERMINTAAN": 20,
                "REFERENSI": {
                    "DPHO": {"kodeobat": "RAC001", "namaobat": "Puyer Batuk"},
                    "FREKUENSIATURAN": {"SIGNA1": 3, "SIGNA2": 1}
                }
            },
            {
                "ID": 502,
                "RACIKAN": 0,
                "JUMLAH": 15,
                "REFERENSI": {"DPHO": {"kodeobat": "NON001", "namaobat": "Amoxicillin 500"}}
            }
        ]
    }))
    .unwrap()
}

async fn body_of(server: &MockServer, request_path: &str) -> Value {
    let requests = server.received_requests().await.unwrap();
    let request = requests
        .iter()
        .find(|r| r.url.path() == request_path)
        .unwrap();
    serde_json::from_slice(&request.body).unwrap()
}

#[tokio::test]
async fn submit_records_header_and_both_items() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sjpresep/v3/insert"))
        .respond_with(ok(json!({"noApotik": NO_APOTIK})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/obatracikan/v3/insert"))
        .respond_with(ok(json!({"kdobat": "RAC001"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/obatnonracikan/v3/insert"))
        .respond_with(ok(json!({"kdobat": "NON001"})))
        .expect(1)
        .mount(&server)
        .await;

    let audit = Arc::new(InMemoryAuditLog::new());
    let report = service(&server, audit.clone())
        .submit_prescription(&submission())
        .await;

    assert!(report.result.is_success());
    assert_eq!(report.external_reference.as_deref(), Some(NO_APOTIK));
    assert_eq!(report.items.len(), 2);
    assert!(report.items.iter().all(|i| i.result.is_success()));

    let header = audit.find_header("2508170001").await.unwrap().unwrap();
    assert_eq!(header.status, AuditStatus::Delivered);
    assert_eq!(header.external_reference.as_deref(), Some(NO_APOTIK));
    assert_eq!(header.drug_type, "1");

    let items = audit.line_items("2508170001").await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].pharmacy_ref, "501");
    assert!(items[0].compounded);
    assert_eq!(items[0].compound_type.as_deref(), Some("R.01"));
    assert_eq!(items[0].requested_quantity, Some(20.0));
    assert_eq!(items[1].pharmacy_ref, "502");
    assert!(!items[1].compounded);
    assert_eq!(items[1].compound_type, None);
    assert_eq!(items[1].quantity, 15.0);

    let compounded = body_of(&server, "/obatracikan/v3/insert").await;
    assert_eq!(compounded["NOSJP"], NO_APOTIK);
    assert_eq!(compounded["JNSROBT"], "R.01");
    assert_eq!(compounded["SIGNA1OBT"], 3);
    assert!(compounded.get("KUNJUNGAN").is_none());

    let plain = body_of(&server, "/obatnonracikan/v3/insert").await;
    assert_eq!(plain["KDOBT"], "NON001");
    assert!(plain.get("JNSROBT").is_none());
    assert!(plain.get("PERMINTAAN").is_none());
}

#[tokio::test]
async fn rejected_header_skips_items() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sjpresep/v3/insert"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metaData": {"code": "201", "message": "No. Resep sudah ada"},
            "response": null,
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/obatracikan/v3/insert"))
        .respond_with(ok(json!({"kdobat": "X"})))
        .expect(0)
        .mount(&server)
        .await;

    let audit = Arc::new(InMemoryAuditLog::new());
    let report = service(&server, audit.clone())
        .submit_prescription(&submission())
        .await;

    assert_eq!(report.result.code(), "201");
    assert!(report.items.is_empty());
    let header = audit.find_header("2508170001").await.unwrap().unwrap();
    assert_eq!(header.status, AuditStatus::Failed);
    assert_eq!(header.response_message.as_deref(), Some("No. Resep sudah ada"));
    assert!(audit.line_items("2508170001").await.unwrap().is_empty());
}

#[tokio::test]
async fn resubmission_updates_existing_rows() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sjpresep/v3/insert"))
        .respond_with(ok(json!({"noApotik": NO_APOTIK})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/obatracikan/v3/insert"))
        .respond_with(ok(json!({"kdobat": "X"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/obatnonracikan/v3/insert"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .mount(&server)
        .await;

    let audit = Arc::new(InMemoryAuditLog::new());
    let service = service(&server, audit.clone());
    service.submit_prescription(&submission()).await;
    let report = service.submit_prescription(&submission()).await;

    assert!(!report.items[1].result.is_success());
    let items = audit.line_items("2508170001").await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].status, AuditStatus::Failed);
}

#[tokio::test]
async fn delete_prescription_voids_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sjpresep/v3/insert"))
        .respond_with(ok(json!({"noApotik": NO_APOTIK})))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/hapusresep"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metaData": {"code": "200", "message": "OK"},
            "response": null,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let audit = Arc::new(InMemoryAuditLog::new());
    let service = service(&server, audit.clone());
    let no_items = PrescriptionSubmission {
        items: Vec::new(),
        ..submission()
    };
    service.submit_prescription(&no_items).await;

    let result = service
        .delete_prescription(&DeletePrescription {
            nosjp: NO_APOTIK.into(),
            refasalsjp: "0112R0010825V000001".into(),
            noresep: "R0001".into(),
        })
        .await;

    assert!(result.is_empty());
    assert!(result.is_acknowledged());
    assert_eq!(result.http_status(), 200);
    let header = audit.find_header("2508170001").await.unwrap().unwrap();
    assert_eq!(header.status, AuditStatus::Voided);
    assert_eq!(header.response_message.as_deref(), Some("batal"));
}

async fn submit_header_only(server: &MockServer, audit: Arc<InMemoryAuditLog>) -> PrescriptionService {
    Mock::given(method("POST"))
        .and(path("/sjpresep/v3/insert"))
        .respond_with(ok(json!({"noApotik": NO_APOTIK})))
        .mount(server)
        .await;
    let service = service(server, audit);
    let no_items = PrescriptionSubmission {
        items: Vec::new(),
        ..submission()
    };
    service.submit_prescription(&no_items).await;
    service
}

#[tokio::test]
async fn delete_prescription_keeps_header_on_blank_reply() {
    for reply in [
        ResponseTemplate::new(200),
        ResponseTemplate::new(200).set_body_string("not json"),
        ResponseTemplate::new(200).set_body_json(json!({"metaData": {"code": "204", "message": "Data tidak ada"}})),
    ] {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/hapusresep"))
            .respond_with(reply)
            .expect(1)
            .mount(&server)
            .await;

        let audit = Arc::new(InMemoryAuditLog::new());
        let service = submit_header_only(&server, audit.clone()).await;
        let result = service
            .delete_prescription(&DeletePrescription {
                nosjp: NO_APOTIK.into(),
                refasalsjp: "0112R0010825V000001".into(),
                noresep: "R0001".into(),
            })
            .await;

        assert!(!result.is_acknowledged(), "unexpected {result:?}");
        assert_eq!(result.http_status(), 500);
        let header = audit.find_header("2508170001").await.unwrap().unwrap();
        assert_eq!(header.status, AuditStatus::Delivered);
    }
}

#[tokio::test]
async fn delete_prescription_sends_and_voids_trimmed_identifiers() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/hapusresep"))
        .respond_with(ok(json!({"nosjp": NO_APOTIK})))
        .expect(1)
        .mount(&server)
        .await;

    let audit = Arc::new(InMemoryAuditLog::new());
    let service = submit_header_only(&server, audit.clone()).await;
    let result = service
        .delete_prescription(&DeletePrescription {
            nosjp: format!("  {NO_APOTIK} "),
            refasalsjp: " 0112R0010825V000001".into(),
            noresep: "R0001 ".into(),
        })
        .await;
    assert!(result.is_success());

    let body = body_of(&server, "/hapusresep").await;
    assert_eq!(body["nosjp"], NO_APOTIK);
    assert_eq!(body["refasalsjp"], "0112R0010825V000001");
    assert_eq!(body["noresep"], "R0001");
    let header = audit.find_header("2508170001").await.unwrap().unwrap();
    assert_eq!(header.status, AuditStatus::Voided);
}

#[tokio::test]
async fn delete_prescription_without_audit_row_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/hapusresep"))
        .respond_with(ok(json!({"nosjp": "UNKNOWN"})))
        .mount(&server)
        .await;

    let audit = Arc::new(InMemoryAuditLog::new());
    let result = service(&server, audit.clone())
        .delete_prescription(&DeletePrescription {
            nosjp: "UNKNOWN".into(),
            refasalsjp: "X".into(),
            noresep: "R9".into(),
        })
        .await;

    assert!(result.is_success());
    assert!(audit.find_header_by_reference("UNKNOWN").await.unwrap().is_none());
}

#[tokio::test]
async fn delete_drug_falls_back_to_second_path_and_voids_item() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sjpresep/v3/insert"))
        .respond_with(ok(json!({"noApotik": NO_APOTIK})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/obatracikan/v3/insert"))
        .respond_with(ok(json!({"kdobat": "X"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/obatnonracikan/v3/insert"))
        .respond_with(ok(json!({"kdobat": "X"})))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/pelayanan/obat/hapus"))
        .respond_with(
            ResponseTemplate::new(404)
                .insert_header("content-type", "text/html")
                .set_body_string("<html><title>Not Found</title></html>"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/obat/hapus"))
        .respond_with(ok(json!({"kodeobat": "NON001"})))
        .expect(1)
        .mount(&server)
        .await;

    let audit = Arc::new(InMemoryAuditLog::new());
    let service = service(&server, audit.clone());
    service.submit_prescription(&submission()).await;

    let result = service
        .delete_drug(&DeleteDrug {
            nosepapotek: NO_APOTIK.into(),
            noresep: "R0001".into(),
            kodeobat: "NON001".into(),
            tipeobat: None,
        })
        .await;
    assert!(result.is_success());

    let body = body_of(&server, "/obat/hapus").await;
    assert_eq!(body["tipeobat"], "N");

    let items = audit.line_items("2508170001").await.unwrap();
    assert_eq!(items[0].status, AuditStatus::Delivered);
    assert_eq!(items[1].status, AuditStatus::Voided);
}

#[tokio::test]
async fn delete_drug_moves_past_html_page_served_as_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sjpresep/v3/insert"))
        .respond_with(ok(json!({"noApotik": NO_APOTIK})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/obatracikan/v3/insert"))
        .respond_with(ok(json!({"kdobat": "X"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/obatnonracikan/v3/insert"))
        .respond_with(ok(json!({"kdobat": "X"})))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/pelayanan/obat/hapus"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<html><body>Request Error: No Mapping Rule matched</body></html>"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/obat/hapus"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metaData": {"code": "200", "message": "OK"},
            "response": null,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let audit = Arc::new(InMemoryAuditLog::new());
    let service = service(&server, audit.clone());
    service.submit_prescription(&submission()).await;

    let result = service
        .delete_drug(&DeleteDrug {
            nosepapotek: NO_APOTIK.into(),
            noresep: "R0001".into(),
            kodeobat: "NON001".into(),
            tipeobat: None,
        })
        .await;
    assert!(result.is_acknowledged(), "unexpected {result:?}");

    let items = audit.line_items("2508170001").await.unwrap();
    assert_eq!(items[0].status, AuditStatus::Delivered);
    assert_eq!(items[1].status, AuditStatus::Voided);
}

#[tokio::test]
async fn delete_drug_keeps_item_when_no_path_confirms() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sjpresep/v3/insert"))
        .respond_with(ok(json!({"noApotik": NO_APOTIK})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ok(json!({"kdobat": "X"})))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let audit = Arc::new(InMemoryAuditLog::new());
    let service = service(&server, audit.clone());
    service.submit_prescription(&submission()).await;

    let result = service
        .delete_drug(&DeleteDrug {
            nosepapotek: NO_APOTIK.into(),
            noresep: "R0001".into(),
            kodeobat: "NON001".into(),
            tipeobat: None,
        })
        .await;
    assert_eq!(result.code(), "500");

    let items = audit.line_items("2508170001").await.unwrap();
    assert!(items.iter().all(|item| item.status == AuditStatus::Delivered));
}

#[tokio::test]
async fn delete_drug_reports_exhaustion() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .expect(2)
        .mount(&server)
        .await;

    let audit = Arc::new(InMemoryAuditLog::new());
    let result = service(&server, audit)
        .delete_drug(&DeleteDrug {
            nosepapotek: NO_APOTIK.into(),
            noresep: "R0001".into(),
            kodeobat: "NON001".into(),
            tipeobat: Some("k".into()),
        })
        .await;

    match result {
        ApiResult::UpstreamError { code, message, .. } => {
            assert_eq!(code, "500");
            assert!(message.starts_with("all 2 strategies failed for delete_drug"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn list_falls_back_to_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/daftarresep"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Request Error"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/daftarresep"))
        .and(header("content-type", "application/json"))
        .respond_with(ok(json!({"listsjp": [
            {"jenisObat": "PRB", "totalBiaya": "1000", "listobat": [{}]},
            {"jenisObat": "Kronis", "totalBiaya": 500}
        ]})))
        .expect(2)
        .mount(&server)
        .await;

    let audit = Arc::new(InMemoryAuditLog::new());
    let service = service(&server, audit);
    let query: PrescriptionListQuery = serde_json::from_value(json!({
        "JnsTgl": "TGLPELSJP",
        "TglMulai": "2025-08-01",
        "TglAkhir": "2025-08-31T23:59"
    }))
    .unwrap();

    let result = service.list_prescriptions(&query).await;
    assert!(result.is_success());

    let body = body_of(&server, "/daftarresep").await;
    assert_eq!(body["kdppk"], "0112A017");
    assert_eq!(body["KdJnsObat"], "0");
    assert_eq!(body["TglAkhir"], "2025-08-31 23:59:00");

    let report = service.prescription_summary(&query).await;
    assert_eq!(report.summary.total_resep, 2);
    assert_eq!(report.summary.total_obat, 1);
    assert_eq!(report.summary.total_biaya, 1500.0);
    assert_eq!(report.summary.by_jenis_obat["Kronis"], 1);
}

#[tokio::test]
async fn drug_service_list_is_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pelayanan/obat/daftar/0112A01708250000001"))
        .respond_with(ok(json!({
            "detailsep": {
                "noSepApotek": NO_APOTIK,
                "listobat": {"KDOBAT": "A1", "tipeObat": "k", "harga": 2500}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let audit = Arc::new(InMemoryAuditLog::new());
    let result = service(&server, audit).drug_service_list(NO_APOTIK).await;

    let payload = result.payload().unwrap();
    assert_eq!(payload["listobat"][0]["kodeobat"], "A1");
    assert_eq!(payload["listobat"][0]["tipeobat"], "K");
    assert_eq!(payload["listobat"][0]["harga"], "2500");
    assert_eq!(payload["detailsep"]["listobat"], payload["listobat"]);
}
