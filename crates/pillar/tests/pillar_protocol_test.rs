use common::messages::{
    DeleteFileRequest, GetAuditTrailsRequest, GetChecksumsRequest, GetFileIdsFinalResponse,
    GetFileIdsRequest, GetFileRequest, IdentifyPillarsForGetFileRequest,
    IdentifyPillarsForPutFileRequest, ListingProgress, PutFileRequest, ReplaceFileRequest,
};
use common::{
    AlarmCode, AllowedOperation, BusEnvelope, ChecksumData, ChecksumSpec, FileAction, FileIds,
    FilePart, OperationPermission, Permission, PermissionSet, PillarSettings, Request,
    RequestBody, RequestHeader, RequestKind, Response, ResponseBody, ResponseCode,
};
use md5::{Digest, Md5};
use pillar::audit::MemoryAuditTrail;
use pillar::bus::MemoryMessageBus;
use pillar::exchange::LocalFileExchange;
use pillar::storage::{FileInfo, FileStore, ReferenceArchive, StorageError};
use pillar::{
    OperationFailure, Pillar, PillarContext, PillarMediator, PillarParts, RequestHandler,
    ResponseChannel,
};
use security::{
    BasicSecurityManager, MessageAuthenticator, MessageSigner, PermissionStore,
    PermissiveSecurityManager, SecurityManager, SigningCredential,
};
use std::fs::{self, File};
use std::io::Read;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use tempfile::TempDir;

const PILLAR: &str = "pillar-1";
const COLLECTION: &str = "books";
const CLIENT: &str = "client-1";

struct Harness {
    _dir: TempDir,
    archive_dir: PathBuf,
    exchange_dir: PathBuf,
    bus: Arc<MemoryMessageBus>,
    pillar: Pillar,
}

impl Harness {
    fn new() -> Self {
        Self::build(|_| {}, Arc::new(PermissiveSecurityManager))
    }

    fn build(
        configure: impl FnOnce(&mut PillarSettings),
        security: Arc<dyn SecurityManager>,
    ) -> Self {
        Self::build_with_archive(configure, security, |archive| -> Arc<dyn FileStore> {
            Arc::new(archive)
        })
    }

    fn build_with_archive(
        configure: impl FnOnce(&mut PillarSettings),
        security: Arc<dyn SecurityManager>,
        wrap_archive: impl FnOnce(ReferenceArchive) -> Arc<dyn FileStore>,
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let archive_dir = dir.path().join("archive");
        let exchange_dir = dir.path().join("exchange");
        fs::create_dir_all(&exchange_dir).unwrap();

        let mut settings =
            PillarSettings::new(PILLAR, vec![COLLECTION.to_string()], archive_dir.clone());
        settings.exchange_dir = Some(exchange_dir.clone());
        configure(&mut settings);

        let bus = Arc::new(MemoryMessageBus::new());
        let archive = ReferenceArchive::new(
            &archive_dir,
            settings.collections.clone(),
            settings.capacity_bytes,
            settings.minimum_size_left,
        )
        .unwrap();
        let parts = PillarParts {
            archive: wrap_archive(archive),
            exchange: Arc::new(LocalFileExchange::new(exchange_dir.clone())),
            audit: Arc::new(MemoryAuditTrail::new()),
            security,
            bus: bus.clone(),
        };
        let pillar = Pillar::with_parts(settings, parts).unwrap();
        Harness {
            _dir: dir,
            archive_dir,
            exchange_dir,
            bus,
            pillar,
        }
    }

    /// 把内容放到交换目录，返回地址
    fn offer(&self, name: &str, content: &[u8]) -> String {
        let path = self.exchange_dir.join(name);
        fs::write(&path, content).unwrap();
        format!("file://{}", path.display())
    }

    fn archived(&self, file_id: &str) -> PathBuf {
        self.archive_dir.join(COLLECTION).join("fileDir").join(file_id)
    }

    /// 发送请求并返回这次请求产生的响应
    fn send(&self, request: &Request) -> Vec<Response> {
        self.send_envelope(&envelope(request))
    }

    fn send_envelope(&self, envelope: &BusEnvelope) -> Vec<Response> {
        self.bus.take();
        self.pillar.handle_envelope(envelope);
        self.bus.responses()
    }

    fn put(&self, file_id: &str, content: &[u8]) {
        let address = self.offer(&format!("{}.upload", file_id), content);
        let responses = self.send(&put_request(file_id, &address, Some(md5_data(content))));
        assert_eq!(
            final_code(&responses),
            ResponseCode::OperationCompleted,
            "{:?}",
            responses
        );
    }
}

fn header(correlation_id: &str) -> RequestHeader {
    RequestHeader {
        correlation_id: correlation_id.to_string(),
        collection_id: Some(COLLECTION.to_string()),
        pillar_id: Some(PILLAR.to_string()),
        reply_to: CLIENT.to_string(),
        from: CLIENT.to_string(),
        destination: Some(PILLAR.to_string()),
        audit_trail_information: None,
    }
}

fn envelope(request: &Request) -> BusEnvelope {
    BusEnvelope {
        body: serde_json::to_string(request).unwrap(),
        signature: None,
    }
}

fn md5_hex(content: &[u8]) -> String {
    hex::encode(Md5::digest(content))
}

fn md5_data(content: &[u8]) -> ChecksumData {
    ChecksumData {
        checksum_spec: ChecksumSpec::new("MD5"),
        checksum_value: md5_hex(content),
        calculation_timestamp: chrono::Utc::now(),
    }
}

fn put_request(file_id: &str, address: &str, checksum: Option<ChecksumData>) -> Request {
    Request {
        header: header(&format!("put-{}", file_id)),
        body: RequestBody::PutFileRequest(PutFileRequest {
            file_id: file_id.to_string(),
            file_address: address.to_string(),
            file_size: None,
            checksum_data_for_new_file: checksum,
            checksum_request_for_new_file: Some(ChecksumSpec::new("MD5")),
        }),
    }
}

fn delete_request(file_id: &str, checksum: Option<ChecksumData>) -> Request {
    Request {
        header: header(&format!("delete-{}", file_id)),
        body: RequestBody::DeleteFileRequest(DeleteFileRequest {
            file_id: file_id.to_string(),
            checksum_data_for_existing_file: checksum,
            checksum_request_for_existing_file: None,
        }),
    }
}

fn final_code(responses: &[Response]) -> ResponseCode {
    let finals: Vec<&Response> = responses.iter().filter(|r| r.is_final()).collect();
    assert_eq!(finals.len(), 1, "expected exactly one final response: {:?}", responses);
    finals[0].response_code()
}

fn final_body(responses: &[Response]) -> &ResponseBody {
    &responses
        .iter()
        .find(|r| r.is_final())
        .expect("final response")
        .body
}

fn codes(responses: &[Response]) -> Vec<ResponseCode> {
    responses.iter().map(|r| r.response_code()).collect()
}

// ============================================================
// PutFile / GetFile
// ============================================================

#[test]
fn test_put_file_progress_then_final() {
    println!("\n=== 测试 PutFile：进度响应后最终响应 ===");
    let h = Harness::new();
    let content = b"the quick brown fox";
    let address = h.offer("doc1.upload", content);

    let responses = h.send(&put_request("doc1", &address, Some(md5_data(content))));
    assert_eq!(
        codes(&responses),
        vec![ResponseCode::OperationAcceptedProgress, ResponseCode::OperationCompleted]
    );
    assert!(responses.iter().all(|r| r.header.correlation_id == "put-doc1"));
    assert!(responses.iter().all(|r| r.header.to == CLIENT));

    let ResponseBody::PutFileFinalResponse(body) = final_body(&responses) else {
        panic!("unexpected body");
    };
    assert_eq!(
        body.checksum_data_for_new_file.as_ref().unwrap().checksum_value,
        md5_hex(content)
    );
    assert_eq!(fs::read(h.archived("doc1")).unwrap(), content);
    println!("✓ 文件已归档，MD5 = {}", md5_hex(content));
}

#[test]
fn test_put_file_with_wrong_checksum_is_discarded() {
    println!("\n=== 测试 PutFile：新文件校验和不匹配 ===");
    let h = Harness::new();
    let address = h.offer("doc1.upload", b"actual content");

    let responses = h.send(&put_request("doc1", &address, Some(md5_data(b"other content"))));
    assert_eq!(final_code(&responses), ResponseCode::NewFileChecksumFailure);
    assert!(!h.archived("doc1").exists());
    let staged = h.archive_dir.join(COLLECTION).join("tmpDir").join("doc1");
    assert!(!staged.exists());

    let alarms = h.bus.alarms();
    assert_eq!(alarms.len(), 1);
    assert_eq!(alarms[0].alarm.alarm_code, AlarmCode::ChecksumAlarm);
    println!("✓ 暂存文件被丢弃，产生一条告警");
}

#[test]
fn test_put_existing_file_is_duplicate() {
    println!("\n=== 测试重复存入 ===");
    let h = Harness::new();
    h.put("doc1", b"first");

    let address = h.offer("again.upload", b"second");
    let responses = h.send(&put_request("doc1", &address, None));
    assert_eq!(codes(&responses), vec![ResponseCode::DuplicateFileFailure]);
    assert_eq!(fs::read(h.archived("doc1")).unwrap(), b"first");
    println!("✓ DUPLICATE_FILE_FAILURE，原文件不变");
}

#[test]
fn test_path_traversal_is_rejected() {
    println!("\n=== 测试路径穿越 ===");
    let h = Harness::new();
    let address = h.offer("evil.upload", b"payload");

    for file_id in ["../escape", "a/b", ".."] {
        let responses = h.send(&put_request(file_id, &address, None));
        assert_eq!(
            codes(&responses),
            vec![ResponseCode::RequestNotUnderstoodFailure],
            "file id {:?}",
            file_id
        );
    }
    assert!(!h.archive_dir.join("escape").exists());

    // 交换目录之外的地址
    let responses = h.send(&put_request("doc1", "file:///etc/hostname", None));
    assert_eq!(final_code(&responses), ResponseCode::FileTransferFailure);
    assert!(!h.archived("doc1").exists());
    println!("✓ 非法文件 ID 与越界地址均被拒绝");
}

#[test]
fn test_get_file_part() {
    println!("\n=== 测试 GetFile 片段 ===");
    let h = Harness::new();
    h.put("doc1", b"hello world");

    let target = h.exchange_dir.join("part.out");
    let request = Request {
        header: header("get-part"),
        body: RequestBody::GetFileRequest(GetFileRequest {
            file_id: "doc1".to_string(),
            file_address: format!("file://{}", target.display()),
            file_part: Some(FilePart {
                part_offset: 6,
                part_length: 5,
            }),
        }),
    };
    let responses = h.send(&request);
    assert_eq!(final_code(&responses), ResponseCode::OperationCompleted);
    assert_eq!(fs::read(&target).unwrap(), b"world");

    let mut too_long = request.clone();
    if let RequestBody::GetFileRequest(body) = &mut too_long.body {
        body.file_part = Some(FilePart {
            part_offset: 6,
            part_length: 50,
        });
    }
    let responses = h.send(&too_long);
    assert_eq!(final_code(&responses), ResponseCode::RequestNotUnderstoodFailure);
    println!("✓ 片段内容正确，越界片段被拒绝");
}

#[test]
fn test_get_missing_file() {
    println!("\n=== 测试获取不存在的文件 ===");
    let h = Harness::new();
    let request = Request {
        header: header("get-missing"),
        body: RequestBody::GetFileRequest(GetFileRequest {
            file_id: "nope".to_string(),
            file_address: "out.bin".to_string(),
            file_part: None,
        }),
    };
    assert_eq!(codes(&h.send(&request)), vec![ResponseCode::FileNotFoundFailure]);
    println!("✓ FILE_NOT_FOUND_FAILURE");
}

// ============================================================
// DeleteFile / ReplaceFile
// ============================================================

#[test]
fn test_delete_with_wrong_checksum_keeps_file() {
    println!("\n=== 测试错误校验和的删除请求 ===");
    let h = Harness::new();
    h.put("doc1", b"precious");
    h.bus.take();

    let mut wrong = md5_data(b"precious");
    wrong.checksum_value = "wrong".to_string();
    let responses = h.send(&delete_request("doc1", Some(wrong)));
    assert_eq!(codes(&responses), vec![ResponseCode::ExistingFileChecksumFailure]);

    let alarms = h.bus.alarms();
    assert_eq!(alarms.len(), 1);
    assert_eq!(alarms[0].alarm.alarm_code, AlarmCode::ChecksumAlarm);
    assert_eq!(alarms[0].alarm.file_id.as_deref(), Some("doc1"));
    assert!(h.archived("doc1").exists());
    println!("✓ 文件保留，告警 fileID = doc1");
}

#[test]
fn test_delete_requires_checksum() {
    println!("\n=== 测试删除必须提供校验和 ===");
    let h = Harness::new();
    h.put("doc1", b"precious");

    let responses = h.send(&delete_request("doc1", None));
    assert_eq!(codes(&responses), vec![ResponseCode::ExistingFileChecksumFailure]);
    assert!(h.archived("doc1").exists());
    println!("✓ 未提供校验和被拒绝");
}

#[test]
fn test_delete_with_correct_checksum() {
    println!("\n=== 测试正确校验和的删除请求 ===");
    let h = Harness::new();
    h.put("doc1", b"obsolete");

    let responses = h.send(&delete_request("doc1", Some(md5_data(b"obsolete"))));
    assert_eq!(
        codes(&responses),
        vec![ResponseCode::OperationAcceptedProgress, ResponseCode::OperationCompleted]
    );
    assert!(!h.archived("doc1").exists());
    assert!(h.bus.alarms().is_empty());

    let responses = h.send(&delete_request("doc1", Some(md5_data(b"obsolete"))));
    assert_eq!(codes(&responses), vec![ResponseCode::FileNotFoundFailure]);
    println!("✓ 删除成功，再次删除返回 FILE_NOT_FOUND_FAILURE");
}

#[test]
fn test_replace_file_refreshes_checksum() {
    println!("\n=== 测试替换文件 ===");
    let h = Harness::new();
    h.put("doc1", b"version one");

    let address = h.offer("v2.upload", b"version two");
    let request = Request {
        header: header("replace-doc1"),
        body: RequestBody::ReplaceFileRequest(ReplaceFileRequest {
            file_id: "doc1".to_string(),
            file_address: address,
            file_size: Some(11),
            checksum_data_for_existing_file: Some(md5_data(b"version one")),
            checksum_request_for_existing_file: None,
            checksum_data_for_new_file: Some(md5_data(b"version two")),
            checksum_request_for_new_file: Some(ChecksumSpec::new("MD5")),
        }),
    };
    let responses = h.send(&request);
    assert_eq!(final_code(&responses), ResponseCode::OperationCompleted);
    assert_eq!(fs::read(h.archived("doc1")).unwrap(), b"version two");

    let checksums = h.send(&Request {
        header: header("checksums"),
        body: RequestBody::GetChecksumsRequest(GetChecksumsRequest {
            file_ids: FileIds::FileId("doc1".to_string()),
            checksum_request_for_existing_file: None,
            result_address: None,
            min_timestamp: None,
            max_timestamp: None,
            max_number_of_results: None,
        }),
    });
    let ResponseBody::GetChecksumsFinalResponse(body) = final_body(&checksums) else {
        panic!("unexpected body");
    };
    let items = &body.resulting_checksums.as_ref().unwrap().checksum_data_items;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].checksum_value, md5_hex(b"version two"));
    println!("✓ 替换后校验和为新内容的校验和");
}

fn replace_request(file_id: &str, address: &str, existing: ChecksumData, new: &[u8]) -> Request {
    Request {
        header: header(&format!("replace-{}", file_id)),
        body: RequestBody::ReplaceFileRequest(ReplaceFileRequest {
            file_id: file_id.to_string(),
            file_address: address.to_string(),
            file_size: Some(new.len() as u64),
            checksum_data_for_existing_file: Some(existing),
            checksum_request_for_existing_file: None,
            checksum_data_for_new_file: Some(md5_data(new)),
            checksum_request_for_new_file: None,
        }),
    }
}

#[test]
fn test_replace_with_wrong_checksum_keeps_file() {
    println!("\n=== 测试错误校验和的替换请求 ===");
    let h = Harness::new();
    h.put("doc1", b"precious");
    h.bus.take();

    let address = h.offer("v2.upload", b"intruder");
    let mut wrong = md5_data(b"precious");
    wrong.checksum_value = md5_hex(b"something else");
    let responses = h.send(&replace_request("doc1", &address, wrong, b"intruder"));
    assert_eq!(codes(&responses), vec![ResponseCode::ExistingFileChecksumFailure]);

    let alarms = h.bus.alarms();
    assert_eq!(alarms.len(), 1);
    assert_eq!(alarms[0].alarm.alarm_code, AlarmCode::ChecksumAlarm);
    assert_eq!(alarms[0].alarm.file_id.as_deref(), Some("doc1"));
    assert_eq!(fs::read(h.archived("doc1")).unwrap(), b"precious");
    let tmp_dir = h.archive_dir.join(COLLECTION).join("tmpDir");
    assert_eq!(fs::read_dir(tmp_dir).unwrap().count(), 0);
    println!("✓ 文件未被替换，暂存区为空，告警 fileID = doc1");
}

/// 打开文件后停住的归档，用来制造读者和写者的交错
struct GatedArchive {
    inner: ReferenceArchive,
    gate: Mutex<Option<(Sender<()>, Receiver<()>)>>,
}

impl GatedArchive {
    fn new(inner: ReferenceArchive) -> Self {
        GatedArchive {
            inner,
            gate: Mutex::new(None),
        }
    }

    /// 下一次 open_file 之后通知 opened，并等待 release
    fn arm(&self, opened: Sender<()>, release: Receiver<()>) {
        *self.gate.lock().unwrap() = Some((opened, release));
    }
}

impl FileStore for GatedArchive {
    fn has_file(&self, file_id: &str, collection_id: &str) -> Result<bool, StorageError> {
        self.inner.has_file(file_id, collection_id)
    }

    fn file_info(&self, file_id: &str, collection_id: &str) -> Result<FileInfo, StorageError> {
        self.inner.file_info(file_id, collection_id)
    }

    fn open_file(&self, file_id: &str, collection_id: &str) -> Result<File, StorageError> {
        let file = self.inner.open_file(file_id, collection_id)?;
        let gate = self.gate.lock().unwrap().take();
        if let Some((opened, release)) = gate {
            opened.send(()).unwrap();
            release.recv().unwrap();
        }
        Ok(file)
    }

    fn list_files(&self, collection_id: &str) -> Result<Vec<FileInfo>, StorageError> {
        self.inner.list_files(collection_id)
    }

    fn size_left(&self, collection_id: &str) -> Result<u64, StorageError> {
        self.inner.size_left(collection_id)
    }

    fn stage_file(
        &self,
        file_id: &str,
        collection_id: &str,
        source: &mut dyn Read,
    ) -> Result<u64, StorageError> {
        self.inner.stage_file(file_id, collection_id, source)
    }

    fn open_staged(&self, file_id: &str, collection_id: &str) -> Result<File, StorageError> {
        self.inner.open_staged(file_id, collection_id)
    }

    fn commit_staged(&self, file_id: &str, collection_id: &str) -> Result<(), StorageError> {
        self.inner.commit_staged(file_id, collection_id)
    }

    fn replace_with_staged(&self, file_id: &str, collection_id: &str) -> Result<(), StorageError> {
        self.inner.replace_with_staged(file_id, collection_id)
    }

    fn discard_staged(&self, file_id: &str, collection_id: &str) -> Result<(), StorageError> {
        self.inner.discard_staged(file_id, collection_id)
    }

    fn delete_file(&self, file_id: &str, collection_id: &str) -> Result<(), StorageError> {
        self.inner.delete_file(file_id, collection_id)
    }
}

#[test]
fn test_delete_after_concurrent_replace_needs_current_checksum() {
    println!("\n=== 测试校验和计算期间被替换的文件 ===");
    let mut gate_handle = None;
    let h = Harness::build_with_archive(
        |_| {},
        Arc::new(PermissiveSecurityManager),
        |archive| -> Arc<dyn FileStore> {
            let gated = Arc::new(GatedArchive::new(archive));
            gate_handle = Some(Arc::clone(&gated));
            gated
        },
    );
    let gated = gate_handle.unwrap();

    // 不请求校验和，缓存保持为空
    let address = h.offer("v1.upload", b"version one");
    let mut put = put_request("doc1", &address, Some(md5_data(b"version one")));
    if let RequestBody::PutFileRequest(body) = &mut put.body {
        body.checksum_request_for_new_file = None;
    }
    assert_eq!(final_code(&h.send(&put)), ResponseCode::OperationCompleted);

    let (opened_tx, opened_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    gated.arm(opened_tx, release_rx);

    let listing = envelope(&Request {
        header: header("checksums-doc1"),
        body: RequestBody::GetChecksumsRequest(GetChecksumsRequest {
            file_ids: FileIds::FileId("doc1".to_string()),
            checksum_request_for_existing_file: None,
            result_address: None,
            min_timestamp: None,
            max_timestamp: None,
            max_number_of_results: None,
        }),
    });
    let mediator = h.pillar.mediator();
    let reader = thread::spawn(move || mediator.handle_envelope(&listing));
    opened_rx.recv().unwrap();

    // 读者持有旧文件时完成替换
    let v2 = h.offer("v2.upload", b"version two");
    let responses = h.send(&replace_request("doc1", &v2, md5_data(b"version one"), b"version two"));
    assert_eq!(final_code(&responses), ResponseCode::OperationCompleted);
    assert_eq!(fs::read(h.archived("doc1")).unwrap(), b"version two");
    release_tx.send(()).unwrap();
    reader.join().unwrap();

    let responses = h.send(&delete_request("doc1", Some(md5_data(b"version one"))));
    assert_eq!(codes(&responses), vec![ResponseCode::ExistingFileChecksumFailure]);
    assert!(h.archived("doc1").exists());

    let responses = h.send(&delete_request("doc1", Some(md5_data(b"version two"))));
    assert_eq!(final_code(&responses), ResponseCode::OperationCompleted);
    assert!(h.bus.alarms().is_empty());
    assert!(!h.archived("doc1").exists());
    println!("✓ 旧内容的校验和被拒绝，新内容的校验和可以删除");
}

// ============================================================
// Listing
// ============================================================

#[test]
fn test_get_file_ids_partial_result() {
    println!("\n=== 测试 GetFileIDs 结果截断 ===");
    let h = Harness::new();
    h.put("doc1", b"one");
    h.put("doc2", b"two");

    let request = Request {
        header: header("ids"),
        body: RequestBody::GetFileIdsRequest(GetFileIdsRequest {
            file_ids: FileIds::AllFileIds,
            result_address: None,
            min_timestamp: None,
            max_timestamp: None,
            max_number_of_results: Some(1),
        }),
    };
    let responses = h.send(&request);
    assert_eq!(final_code(&responses), ResponseCode::OperationCompleted);
    let ResponseBody::GetFileIdsFinalResponse(body) = final_body(&responses) else {
        panic!("unexpected body");
    };
    assert!(body.partial_result);
    assert_eq!(body.resulting_file_ids.as_ref().unwrap().file_ids_data.len(), 1);

    let mut all = request.clone();
    if let RequestBody::GetFileIdsRequest(body) = &mut all.body {
        body.max_number_of_results = None;
    }
    let responses = h.send(&all);
    let ResponseBody::GetFileIdsFinalResponse(body) = final_body(&responses) else {
        panic!("unexpected body");
    };
    assert!(!body.partial_result);
    assert_eq!(body.resulting_file_ids.as_ref().unwrap().file_ids_data.len(), 2);
    println!("✓ max=1 时 partialResult = true");
}

#[test]
fn test_get_checksums_to_result_address() {
    println!("\n=== 测试校验和结果上传 ===");
    let h = Harness::new();
    h.put("doc1", b"one");
    h.put("doc2", b"two");

    let target = h.exchange_dir.join("checksums.json");
    let responses = h.send(&Request {
        header: header("checksums-upload"),
        body: RequestBody::GetChecksumsRequest(GetChecksumsRequest {
            file_ids: FileIds::AllFileIds,
            checksum_request_for_existing_file: Some(ChecksumSpec::new("SHA256")),
            result_address: Some(format!("file://{}", target.display())),
            min_timestamp: None,
            max_timestamp: None,
            max_number_of_results: None,
        }),
    });
    assert_eq!(final_code(&responses), ResponseCode::OperationCompleted);
    let ResponseBody::GetChecksumsFinalResponse(body) = final_body(&responses) else {
        panic!("unexpected body");
    };
    let resulting = body.resulting_checksums.as_ref().unwrap();
    assert!(resulting.checksum_data_items.is_empty());

    let uploaded: serde_json::Value =
        serde_json::from_slice(&fs::read(&target).unwrap()).unwrap();
    assert_eq!(uploaded.as_array().unwrap().len(), 2);
    println!("✓ 结果写入 {}", target.display());
}

#[test]
fn test_unsupported_checksum_algorithm() {
    println!("\n=== 测试不支持的校验和算法 ===");
    let h = Harness::new();
    h.put("doc1", b"one");

    let responses = h.send(&Request {
        header: header("crc"),
        body: RequestBody::GetChecksumsRequest(GetChecksumsRequest {
            file_ids: FileIds::AllFileIds,
            checksum_request_for_existing_file: Some(ChecksumSpec::new("CRC32")),
            result_address: None,
            min_timestamp: None,
            max_timestamp: None,
            max_number_of_results: None,
        }),
    });
    assert_eq!(codes(&responses), vec![ResponseCode::RequestNotSupported]);
    println!("✓ REQUEST_NOT_SUPPORTED");
}

#[test]
fn test_audit_trail_records_operations() {
    println!("\n=== 测试审计记录 ===");
    let h = Harness::new();
    h.put("doc1", b"one");
    h.send(&delete_request("doc1", None));

    let responses = h.send(&Request {
        header: header("audit"),
        body: RequestBody::GetAuditTrailsRequest(GetAuditTrailsRequest {
            contributor: PILLAR.to_string(),
            min_sequence_number: None,
            max_sequence_number: None,
            file_id: Some("doc1".to_string()),
            min_timestamp: None,
            max_timestamp: None,
            max_number_of_results: None,
            result_address: None,
        }),
    });
    let ResponseBody::GetAuditTrailsFinalResponse(body) = final_body(&responses) else {
        panic!("unexpected body");
    };
    let events = &body.resulting_audit_trails.as_ref().unwrap().audit_trail_events;
    let actions: Vec<FileAction> = events.iter().map(|e| e.action_on_file).collect();
    assert_eq!(
        actions,
        vec![
            FileAction::PutFile,
            FileAction::ChecksumCalculated,
            FileAction::Failure
        ]
    );
    assert!(events.iter().all(|e| e.actor_on_file == CLIENT));
    assert!(events.windows(2).all(|w| w[0].sequence_number < w[1].sequence_number));
    println!("✓ 审计事件: {:?}", actions);
}

// ============================================================
// Identification
// ============================================================

#[test]
fn test_identify_put_for_existing_file() {
    println!("\n=== 测试 PutFile 识别：文件已存在 ===");
    let h = Harness::new();
    h.put("doc1", b"already here");

    let mut identify_header = header("identify-put");
    identify_header.pillar_id = None;
    let responses = h.send(&Request {
        header: identify_header,
        body: RequestBody::IdentifyPillarsForPutFileRequest(IdentifyPillarsForPutFileRequest {
            file_id: Some("doc1".to_string()),
            file_size: None,
        }),
    });
    assert_eq!(codes(&responses), vec![ResponseCode::DuplicateFileFailure]);
    let ResponseBody::IdentifyPillarsForPutFileResponse(body) = final_body(&responses) else {
        panic!("unexpected body");
    };
    assert_eq!(
        body.checksum_data_for_existing_file.as_ref().unwrap().checksum_value,
        md5_hex(b"already here")
    );

    let responses = h.send(&Request {
        header: header("identify-put-new"),
        body: RequestBody::IdentifyPillarsForPutFileRequest(IdentifyPillarsForPutFileRequest {
            file_id: Some("doc2".to_string()),
            file_size: Some(10),
        }),
    });
    assert_eq!(codes(&responses), vec![ResponseCode::IdentificationPositive]);
    println!("✓ 已存在返回 DUPLICATE_FILE_FAILURE，新文件返回 IDENTIFICATION_POSITIVE");
}

#[test]
fn test_identify_put_without_space() {
    println!("\n=== 测试 PutFile 识别：空间不足 ===");
    let h = Harness::build(
        |settings| settings.capacity_bytes = 100,
        Arc::new(PermissiveSecurityManager),
    );
    let responses = h.send(&Request {
        header: header("identify-big"),
        body: RequestBody::IdentifyPillarsForPutFileRequest(IdentifyPillarsForPutFileRequest {
            file_id: Some("big".to_string()),
            file_size: Some(1000),
        }),
    });
    assert_eq!(codes(&responses), vec![ResponseCode::Failure]);
    assert!(h.bus.alarms().is_empty());
    println!("✓ 空间不足返回 FAILURE，无告警");
}

#[test]
fn test_identify_for_missing_file_and_unserved_collection() {
    println!("\n=== 测试 GetFile 识别 ===");
    let h = Harness::new();
    let request = Request {
        header: header("identify-get"),
        body: RequestBody::IdentifyPillarsForGetFileRequest(IdentifyPillarsForGetFileRequest {
            file_id: "nope".to_string(),
        }),
    };
    assert_eq!(codes(&h.send(&request)), vec![ResponseCode::FileNotFoundFailure]);

    let mut other = request.clone();
    other.header.collection_id = Some("films".to_string());
    assert_eq!(codes(&h.send(&other)), vec![ResponseCode::RequestNotSupported]);
    println!("✓ 文件不存在 / 集合不受支持");
}

// ============================================================
// Boundary behaviour
// ============================================================

struct PanickingHandler;

impl RequestHandler for PanickingHandler {
    fn kind(&self) -> RequestKind {
        RequestKind::GetFileIds
    }

    fn handle(
        &self,
        _request: &Request,
        _ctx: &PillarContext,
        channel: &mut ResponseChannel<'_>,
    ) -> Result<(), OperationFailure> {
        channel.send_progress(ResponseBody::GetFileIdsProgressResponse(ListingProgress {
            file_ids: None,
            result_address: None,
        }))?;
        panic!("storage backend exploded");
    }

    fn failure_body(&self, _request: &Request) -> ResponseBody {
        ResponseBody::GetFileIdsFinalResponse(GetFileIdsFinalResponse {
            file_ids: FileIds::AllFileIds,
            resulting_file_ids: None,
            partial_result: false,
        })
    }
}

#[test]
fn test_panicking_handler_sends_one_failure() {
    println!("\n=== 测试处理器 panic ===");
    let h = Harness::new();
    let mediator = PillarMediator::with_handlers(
        Arc::clone(h.pillar.mediator().context()),
        vec![Arc::new(PanickingHandler)],
    );

    let request = Request {
        header: header("boom"),
        body: RequestBody::GetFileIdsRequest(GetFileIdsRequest {
            file_ids: FileIds::AllFileIds,
            result_address: None,
            min_timestamp: None,
            max_timestamp: None,
            max_number_of_results: None,
        }),
    };
    h.bus.take();
    mediator.handle_envelope(&envelope(&request));

    let responses = h.bus.responses();
    assert_eq!(
        codes(&responses),
        vec![ResponseCode::OperationAcceptedProgress, ResponseCode::Failure]
    );
    let alarms = h.bus.alarms();
    assert_eq!(alarms.len(), 1);
    assert_eq!(alarms[0].alarm.alarm_code, AlarmCode::ComponentFailure);
    println!("✓ 恰好一条 FAILURE 最终响应 + COMPONENT_FAILURE 告警");
}

/// 发完最终响应后继续发送的处理器
struct ChattyHandler;

impl RequestHandler for ChattyHandler {
    fn kind(&self) -> RequestKind {
        RequestKind::GetFileIds
    }

    fn handle(
        &self,
        request: &Request,
        _ctx: &PillarContext,
        channel: &mut ResponseChannel<'_>,
    ) -> Result<(), OperationFailure> {
        channel.complete(self.failure_body(request))?;
        assert!(channel
            .send_progress(ResponseBody::GetFileIdsProgressResponse(ListingProgress {
                file_ids: None,
                result_address: None,
            }))
            .is_err());
        assert!(channel.complete(self.failure_body(request)).is_err());
        Ok(())
    }

    fn failure_body(&self, _request: &Request) -> ResponseBody {
        ResponseBody::GetFileIdsFinalResponse(GetFileIdsFinalResponse {
            file_ids: FileIds::AllFileIds,
            resulting_file_ids: None,
            partial_result: false,
        })
    }
}

/// 不发最终响应就返回的处理器
struct SilentHandler;

impl RequestHandler for SilentHandler {
    fn kind(&self) -> RequestKind {
        RequestKind::GetFileIds
    }

    fn handle(
        &self,
        _request: &Request,
        _ctx: &PillarContext,
        _channel: &mut ResponseChannel<'_>,
    ) -> Result<(), OperationFailure> {
        Ok(())
    }

    fn failure_body(&self, request: &Request) -> ResponseBody {
        ChattyHandler.failure_body(request)
    }
}

fn file_ids_request(correlation_id: &str) -> Request {
    Request {
        header: header(correlation_id),
        body: RequestBody::GetFileIdsRequest(GetFileIdsRequest {
            file_ids: FileIds::AllFileIds,
            result_address: None,
            min_timestamp: None,
            max_timestamp: None,
            max_number_of_results: None,
        }),
    }
}

#[test]
fn test_responses_after_final_are_refused() {
    println!("\n=== 测试最终响应之后的发送 ===");
    let h = Harness::new();
    let mediator = PillarMediator::with_handlers(
        Arc::clone(h.pillar.mediator().context()),
        vec![Arc::new(ChattyHandler)],
    );
    h.bus.take();
    mediator.handle_envelope(&envelope(&file_ids_request("chatty")));

    assert_eq!(
        codes(&h.bus.responses()),
        vec![ResponseCode::OperationCompleted]
    );
    println!("✓ 只发出一条最终响应");
}

#[test]
fn test_missing_final_response_becomes_failure() {
    println!("\n=== 测试处理器未发最终响应 ===");
    let h = Harness::new();
    let mediator = PillarMediator::with_handlers(
        Arc::clone(h.pillar.mediator().context()),
        vec![Arc::new(SilentHandler)],
    );
    h.bus.take();
    mediator.handle_envelope(&envelope(&file_ids_request("silent")));

    assert_eq!(codes(&h.bus.responses()), vec![ResponseCode::Failure]);
    assert_eq!(h.bus.alarms().len(), 1);
    println!("✓ 边界补发 FAILURE");
}

#[test]
fn test_invalid_message_raises_alarm() {
    println!("\n=== 测试无法解析的消息 ===");
    let h = Harness::new();
    let responses = h.send_envelope(&BusEnvelope {
        body: "{not json".to_string(),
        signature: None,
    });
    assert!(responses.is_empty());
    let alarms = h.bus.alarms();
    assert_eq!(alarms.len(), 1);
    assert_eq!(alarms[0].alarm.alarm_code, AlarmCode::InvalidMessage);
    println!("✓ 无响应，产生 INVALID_MESSAGE 告警");
}

#[tokio::test]
async fn test_dispatch_runs_request() {
    println!("\n=== 测试异步分发 ===");
    let h = Harness::new();
    h.put("doc1", b"one");
    h.bus.take();

    let request = Request {
        header: header("async-ids"),
        body: RequestBody::GetFileIdsRequest(GetFileIdsRequest {
            file_ids: FileIds::AllFileIds,
            result_address: None,
            min_timestamp: None,
            max_timestamp: None,
            max_number_of_results: None,
        }),
    };
    h.pillar.mediator().dispatch(envelope(&request)).await;
    assert_eq!(final_code(&h.bus.responses()), ResponseCode::OperationCompleted);
    println!("✓ spawn_blocking 中完成处理");
}

// ============================================================
// Signed traffic
// ============================================================

struct TestCert {
    cert_pem: String,
    credential_pem: String,
}

impl TestCert {
    fn signer(&self) -> MessageSigner {
        MessageSigner::new(SigningCredential::from_pem(self.credential_pem.as_bytes()).unwrap())
    }
}

fn mint(common_name: &str, serial: &[u8]) -> TestCert {
    let key_pair = rcgen::KeyPair::generate_for(&rcgen::PKCS_ED25519).unwrap();
    let mut params = rcgen::CertificateParams::new(vec![common_name.to_string()]).unwrap();
    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, common_name);
    params.serial_number = Some(rcgen::SerialNumber::from_slice(serial));
    let cert = params.self_signed(&key_pair).unwrap();
    let cert_pem = cert.pem();
    TestCert {
        credential_pem: format!("{}{}", key_pair.serialize_pem(), cert_pem),
        cert_pem,
    }
}

fn permission(cert: &TestCert, user: &str, operations: &[AllowedOperation]) -> Permission {
    Permission {
        certificate: cert.cert_pem.clone(),
        allowed_certificate_users: vec![user.to_string()],
        operation_permissions: operations
            .iter()
            .map(|op| OperationPermission {
                operation: *op,
                collections: vec![],
            })
            .collect(),
    }
}

struct SignedSetup {
    harness: Harness,
    pillar_cert: TestCert,
    client_cert: TestCert,
    reader_cert: TestCert,
    store: Arc<PermissionStore>,
}

fn signed_setup() -> SignedSetup {
    let pillar_cert = mint(PILLAR, &[0x10]);
    let client_cert = mint(CLIENT, &[0x11]);
    let reader_cert = mint("reader-1", &[0x12]);
    let set = PermissionSet {
        permissions: vec![
            permission(&pillar_cert, PILLAR, &[]),
            permission(&client_cert, CLIENT, &[AllowedOperation::All]),
            permission(&reader_cert, "reader-1", &[AllowedOperation::GetFileIds]),
        ],
    };
    let store = Arc::new(PermissionStore::from_permissions(&set, PILLAR).unwrap());
    let security = BasicSecurityManager::with_parts(
        PILLAR,
        true,
        true,
        Arc::clone(&store),
        Some(pillar_cert.signer()),
    );
    SignedSetup {
        harness: Harness::build(|_| {}, Arc::new(security)),
        pillar_cert,
        client_cert,
        reader_cert,
        store,
    }
}

fn signed(request: &Request, cert: &TestCert) -> BusEnvelope {
    let body = serde_json::to_string(request).unwrap();
    let signature = cert.signer().sign_message(body.as_bytes()).unwrap();
    BusEnvelope {
        body,
        signature: Some(hex::encode(signature)),
    }
}

#[test]
fn test_signed_put_and_signed_responses() {
    println!("\n=== 测试签名请求与签名响应 ===");
    let setup = signed_setup();
    let h = &setup.harness;
    let address = h.offer("doc1.upload", b"signed content");
    let request = put_request("doc1", &address, Some(md5_data(b"signed content")));

    let responses = h.send_envelope(&signed(&request, &setup.client_cert));
    assert_eq!(final_code(&responses), ResponseCode::OperationCompleted);

    // 对端用注册的节点证书验证每条响应
    let peer = MessageAuthenticator::new(Arc::clone(&setup.store));
    let pillar_identity = setup.pillar_cert.signer().certificate().identity().clone();
    for message in h.bus.sent() {
        let signature = hex::decode(message.envelope.signature.as_ref().unwrap()).unwrap();
        let identity = peer
            .authenticate_message(message.envelope.body.as_bytes(), &signature)
            .unwrap();
        assert_eq!(identity, pillar_identity);
    }
    println!("✓ 所有响应都由节点证书签名");
}

#[test]
fn test_unsigned_request_is_rejected() {
    println!("\n=== 测试未签名请求 ===");
    let setup = signed_setup();
    let h = &setup.harness;
    let address = h.offer("doc1.upload", b"content");

    let responses = h.send(&put_request("doc1", &address, None));
    assert_eq!(codes(&responses), vec![ResponseCode::RequestNotUnderstoodFailure]);
    assert!(h.bus.alarms().is_empty());
    assert!(!h.archived("doc1").exists());
    println!("✓ REQUEST_NOT_UNDERSTOOD_FAILURE，无告警");
}

#[test]
fn test_operation_not_permitted() {
    println!("\n=== 测试操作未授权 ===");
    let setup = signed_setup();
    let h = &setup.harness;
    let address = h.offer("doc1.upload", b"content");
    h.send_envelope(&signed(
        &put_request("doc1", &address, None),
        &setup.client_cert,
    ));
    assert!(h.archived("doc1").exists());

    let mut request = delete_request("doc1", Some(md5_data(b"content")));
    request.header.from = "reader-1".to_string();
    request.header.reply_to = "reader-1".to_string();
    let responses = h.send_envelope(&signed(&request, &setup.reader_cert));
    assert_eq!(codes(&responses), vec![ResponseCode::RequestNotUnderstoodFailure]);
    assert!(h.archived("doc1").exists());

    // 允许的操作照常处理
    let mut listing = Request {
        header: header("reader-ids"),
        body: RequestBody::GetFileIdsRequest(GetFileIdsRequest {
            file_ids: FileIds::AllFileIds,
            result_address: None,
            min_timestamp: None,
            max_timestamp: None,
            max_number_of_results: None,
        }),
    };
    listing.header.from = "reader-1".to_string();
    let responses = h.send_envelope(&signed(&listing, &setup.reader_cert));
    assert_eq!(final_code(&responses), ResponseCode::OperationCompleted);
    println!("✓ 只读证书不能删除，但可以列出文件");
}

#[test]
fn test_certificate_used_by_wrong_component() {
    println!("\n=== 测试证书被其他组件使用 ===");
    let setup = signed_setup();
    let h = &setup.harness;
    let address = h.offer("doc1.upload", b"content");

    let mut request = put_request("doc1", &address, None);
    request.header.from = "impostor".to_string();
    let responses = h.send_envelope(&signed(&request, &setup.client_cert));
    assert_eq!(codes(&responses), vec![ResponseCode::RequestNotUnderstoodFailure]);
    assert!(!h.archived("doc1").exists());
    println!("✓ 证书使用者不匹配被拒绝");
}
