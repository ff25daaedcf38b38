//! # Heatmap View
//!
//! Shows the unrolled texture as an image stretched over the available
//! space. One texel per column and band; scaling uses nearest-neighbor so
//! adjacent columns stay crisp.

use iced::widget::image::FilterMethod;
use iced::widget::{container, image, text};
use iced::{ContentFit, Element, Length};

pub struct HeatmapView {
    handle: Option<image::Handle>,
}

impl HeatmapView {
    pub fn new(handle: Option<image::Handle>) -> Self {
        Self { handle }
    }

    pub fn view(self) -> Element<'static, crate::Message> {
        let content: Element<'static, crate::Message> = match self.handle {
            Some(handle) => image(handle)
                .width(Length::Fill)
                .height(Length::Fill)
                .content_fit(ContentFit::Fill)
                .filter_method(FilterMethod::Nearest)
                .into(),
            None => text("Waiting for the renderer...").size(20).into(),
        };

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .into()
    }
}
