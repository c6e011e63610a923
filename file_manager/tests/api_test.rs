use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use file_manager::{create_app, AppState, FileConfig, FileManager, LinkStyle, StorageLayout};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "file-manager-test-boundary";

fn setup_app(layout: StorageLayout) -> (Router, TempDir) {
    setup_app_with(FileConfig {
        layout,
        ..FileConfig::default()
    })
}

fn setup_app_with(config: FileConfig) -> (Router, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = FileConfig {
        base_dir: Some(temp_dir.path().to_path_buf()),
        link_style: LinkStyle::Url,
        ..config
    };

    let state = AppState::new(FileManager::new(config));
    (create_app(state).unwrap(), temp_dir)
}

fn multipart_body(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (filename, content) in files {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(uri: &str, files: &[(&str, &[u8])]) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::HOST, "localhost:3000")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(files)))
        .unwrap()
}

fn plain_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _temp_dir) = setup_app(StorageLayout::Category);

    let response = app.oneshot(plain_request(Method::GET, "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = read_json(response).await;
    assert_eq!(json["data"]["status"], "healthy");
    assert_eq!(json["data"]["layout"], "category");
    assert_eq!(json["data"]["root_folder"], "Uploads");
}

#[tokio::test]
async fn test_upload_download_delete_cycle() {
    let (app, _temp_dir) = setup_app(StorageLayout::Category);

    let response = app
        .clone()
        .oneshot(upload_request(
            "/api/files/upload?category=document",
            &[("notes.txt", b"meeting notes".as_slice())],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = read_json(response).await;
    assert_eq!(json["success"], true);
    let name = json["data"]["name"].as_str().unwrap().to_string();
    assert!(name.ends_with(".txt"));
    assert_eq!(json["data"]["original_filename"], "notes.txt");
    assert_eq!(
        json["data"]["location"],
        format!("http://localhost:3000/Uploads/Document/{}", name)
    );

    let response = app
        .clone()
        .oneshot(plain_request(Method::GET, &format!("/api/files/{}", name)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"meeting notes");

    let response = app
        .clone()
        .oneshot(plain_request(
            Method::GET,
            &format!("/Uploads/Document/{}", name),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(plain_request(
            Method::DELETE,
            &format!("/api/files/{}?category=document", name),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(json["data"]["count"], 1);

    let response = app
        .oneshot(plain_request(Method::GET, &format!("/api/files/{}", name)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_forbidden_extension_is_bad_request() {
    let (app, temp_dir) = setup_app(StorageLayout::Category);

    let response = app
        .oneshot(upload_request("/api/files/upload", &[("payload.exe", b"MZ".as_slice())]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = read_json(response).await;
    assert_eq!(json["status"], 400);
    assert_eq!(
        json["error"],
        "File type .exe is not allowed for security reasons"
    );
    assert!(!temp_dir.path().join("Uploads").join("Other").exists());
}

#[tokio::test]
async fn test_oversized_upload_is_payload_too_large() {
    let (app, _temp_dir) = setup_app(StorageLayout::Category);
    let content = vec![0u8; 11 * 1024 * 1024];

    let response = app
        .oneshot(upload_request(
            "/api/files/upload?category=document",
            &[("big.pdf", content.as_slice())],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_upload_many_into_subfolder() {
    let (app, temp_dir) = setup_app(StorageLayout::Subfolder);

    let response = app
        .oneshot(upload_request(
            "/api/files/upload-many?subfolder=gallery/2024",
            &[("a.png", b"first image".as_slice()), ("b.jpg", b"second image".as_slice())],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = read_json(response).await;
    let stored = json["data"].as_array().unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0]["original_filename"], "a.png");
    assert_eq!(stored[1]["original_filename"], "b.jpg");

    for file in stored {
        let name = file["name"].as_str().unwrap();
        assert!(temp_dir
            .path()
            .join("Uploads")
            .join("gallery")
            .join("2024")
            .join(name)
            .exists());
    }
}

#[tokio::test]
async fn test_traversal_subfolder_is_rejected() {
    let (app, temp_dir) = setup_app(StorageLayout::Subfolder);

    let response = app
        .oneshot(upload_request(
            "/api/files/upload?subfolder=../outside",
            &[("a.txt", b"escape".as_slice())],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!temp_dir.path().join("outside").exists());
}

#[tokio::test]
async fn test_compress_returns_zip_attachment() {
    let (app, _temp_dir) = setup_app(StorageLayout::Category);

    let response = app
        .oneshot(upload_request(
            "/api/files/compress",
            &[("report.txt", b"numbers numbers numbers".as_slice())],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"report.zip\""
    );

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.to_vec())).unwrap();
    assert_eq!(archive.len(), 1);
}

#[tokio::test]
async fn test_ambiguous_download_is_conflict() {
    let (app, temp_dir) = setup_app(StorageLayout::Subfolder);

    let root = temp_dir.path().join("Uploads");
    std::fs::create_dir_all(root.join("one")).unwrap();
    std::fs::create_dir_all(root.join("two")).unwrap();
    std::fs::write(root.join("one").join("dup.txt"), b"1").unwrap();
    std::fs::write(root.join("two").join("dup.txt"), b"2").unwrap();

    let response = app
        .clone()
        .oneshot(plain_request(Method::GET, "/api/files/dup.txt"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .clone()
        .oneshot(plain_request(Method::GET, "/api/files/dup.txt?subfolder=two"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(plain_request(Method::DELETE, "/api/files/dup.txt"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(json["data"]["count"], 2);
    assert!(!root.join("one").join("dup.txt").exists());
}

#[tokio::test]
async fn test_uncapped_batch_fits_the_body_limit() {
    let (app, _temp_dir) = setup_app_with(FileConfig {
        max_total_files_size_in_mb: None,
        ..FileConfig::default()
    });
    let content = vec![b'x'; 8 * 1024 * 1024];

    let response = app
        .oneshot(upload_request(
            "/api/files/upload-many?category=document",
            &[("a.txt", content.as_slice()), ("b.txt", content.as_slice())],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = read_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_oversized_batch_body_is_payload_too_large() {
    let (app, temp_dir) = setup_app_with(FileConfig {
        max_total_files_size_in_mb: None,
        max_single_file_size_bytes: 1024 * 1024,
        max_files_per_request: 2,
        ..FileConfig::default()
    });
    let content = vec![b'x'; 1024 * 1024];
    let files: Vec<(&str, &[u8])> = ["a.txt", "b.txt", "c.txt", "d.txt"]
        .into_iter()
        .map(|name| (name, content.as_slice()))
        .collect();

    let response = app
        .oneshot(upload_request("/api/files/upload-many?category=document", &files))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let json = read_json(response).await;
    assert_eq!(json["status"], 413);
    assert!(json["error"].as_str().unwrap().contains("upload limit of 3 MB"));
    assert!(!temp_dir.path().join("Uploads").exists());
}

#[tokio::test]
async fn test_unusable_batch_limit_is_bad_request() {
    for limit in ["NaN", "inf", "0", "-1"] {
        let (app, temp_dir) = setup_app(StorageLayout::Category);

        let response = app
            .oneshot(upload_request(
                &format!("/api/files/upload-many?category=document&limit_mb={}", limit),
                &[("a.txt", b"first".as_slice()), ("b.txt", b"second".as_slice())],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "limit_mb={}", limit);
        assert!(!temp_dir.path().join("Uploads").exists());
    }
}
