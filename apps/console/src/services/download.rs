use thiserror::Error;

use crate::activity::ExportFile;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("浏览器环境不可用")]
    NoWindow,
    #[error("创建下载文件失败: {0}")]
    Browser(String),
    #[error("写入文件失败: {0}")]
    Io(#[from] std::io::Error),
}

/// 通过 Blob 对象 URL 和临时 `<a download>` 触发浏览器下载。
#[cfg(target_arch = "wasm32")]
pub fn deliver(file: &ExportFile) -> Result<String, DownloadError> {
    use wasm_bindgen::{JsCast, JsValue};
    use web_sys::{Blob, BlobPropertyBag, HtmlAnchorElement, Url};

    let browser = |err: JsValue| {
        DownloadError::Browser(err.as_string().unwrap_or_else(|| format!("{err:?}")))
    };

    let window = web_sys::window().ok_or(DownloadError::NoWindow)?;
    let document = window.document().ok_or(DownloadError::NoWindow)?;

    let parts = js_sys::Array::of1(&JsValue::from_str(&file.contents));
    let options = BlobPropertyBag::new();
    options.set_type(file.mime_type);
    let blob = Blob::new_with_str_sequence_and_options(&parts, &options).map_err(browser)?;
    let url = Url::create_object_url_with_blob(&blob).map_err(browser)?;

    let anchor: HtmlAnchorElement = document
        .create_element("a")
        .map_err(browser)?
        .dyn_into()
        .map_err(|_| DownloadError::Browser("anchor element unavailable".into()))?;
    anchor.set_href(&url);
    anchor.set_download(&file.filename);
    anchor.click();

    Url::revoke_object_url(&url).map_err(browser)?;
    Ok(file.filename.clone())
}

/// 非浏览器环境写入临时目录，便于本地调试。
#[cfg(not(target_arch = "wasm32"))]
pub fn deliver(file: &ExportFile) -> Result<String, DownloadError> {
    let path = std::env::temp_dir().join(&file.filename);
    std::fs::write(&path, file.contents.as_bytes())?;
    Ok(path.display().to_string())
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    #[test]
    fn native_delivery_writes_contents() {
        let file = ExportFile {
            filename: format!("mirror-activity-test-{}.csv", uuid::Uuid::new_v4().simple()),
            mime_type: "text/csv;charset=utf-8",
            contents: "Timestamp,Message\n".into(),
        };
        let path = deliver(&file).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), file.contents);
        std::fs::remove_file(path).unwrap();
    }
}
