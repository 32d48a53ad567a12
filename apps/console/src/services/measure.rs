use crate::activity::{Measurer, RowKey, Viewport};

/// 通过 `getBoundingClientRect` 读取已挂载行的真实高度。
pub struct DomMeasurer;

#[cfg(target_arch = "wasm32")]
impl Measurer for DomMeasurer {
    fn measure(&self, key: &RowKey) -> Option<f64> {
        let document = web_sys::window()?.document()?;
        let element = document.get_element_by_id(&key.dom_id())?;
        let height = element.get_bounding_client_rect().height();
        (height > 0.0).then_some(height)
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Measurer for DomMeasurer {
    fn measure(&self, _key: &RowKey) -> Option<f64> {
        None
    }
}

/// 读取滚动容器当前的滚动位置与可视高度。
#[cfg(target_arch = "wasm32")]
pub fn read_viewport(container_id: &str) -> Option<Viewport> {
    let document = web_sys::window()?.document()?;
    let element = document.get_element_by_id(container_id)?;
    Some(Viewport {
        scroll_top: f64::from(element.scroll_top()),
        height: f64::from(element.client_height()),
    })
}

#[cfg(not(target_arch = "wasm32"))]
pub fn read_viewport(_container_id: &str) -> Option<Viewport> {
    None
}
