//! # Main Display Module
//!
//! Layout of the heatmap window: the scrolling texture on top and a one-line
//! status bar below it.

use iced::widget::{Space, column, container, horizontal_space, row, text};
use iced::{Alignment, Element, Length};

use super::heatmap_view::HeatmapView;

/// Creates the complete main application view
pub fn create_main_view(data: &crate::AppDisplayData) -> Element<'static, crate::Message> {
    if data.shutting_down {
        return centered_message("Shutting down...");
    }
    if let Some(error) = &data.error {
        return centered_message(&format!("Visualization unavailable: {}", error));
    }

    let heatmap = HeatmapView::new(data.image.clone()).view();

    column![heatmap, create_status_bar(data)]
        .spacing(4)
        .padding(8)
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

/// Pipeline state, counters and queue depth.
fn create_status_bar(data: &crate::AppDisplayData) -> Element<'static, crate::Message> {
    let stats = data.stats;
    let mut counters = format!("applied {}   queued {}", stats.applied, data.queued);
    if stats.overflowed > 0 {
        counters.push_str(&format!("   dropped {}", stats.overflowed));
    }

    row![
        text(format!("{:?}", data.state)).size(14),
        Space::with_width(20),
        text(counters).size(14),
        horizontal_space(),
        text("newest at right").size(12),
    ]
    .align_y(Alignment::Center)
    .padding([2, 6])
    .into()
}

fn centered_message(message: &str) -> Element<'static, crate::Message> {
    container(text(message.to_owned()).size(28))
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .into()
}
