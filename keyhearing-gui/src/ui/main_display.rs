//! # Main Display Module
//!
//! Turns the current [`Reading`](crate::Reading) into the window contents:
//! a text label on a background that signals the tuning state.

use iced::widget::{column, container, text, Space};
use iced::{Alignment, Background, Color, Element, Length};
use keyhearing_core::Verdict;

use super::cent_meter::CentMeter;
use crate::{Message, Reading};

/// Offsets smaller than this (in cents) count as in tune.
pub const IN_TUNE_CENTS: f32 = 30.0;

const IDLE: Color = Color::BLACK;
const IN_TUNE: Color = Color { r: 0.0, g: 0.5, b: 0.0, a: 1.0 };
const OUT_OF_TUNE: Color = Color { r: 0.8, g: 0.0, b: 0.0, a: 1.0 };
const ERROR: Color = Color { r: 1.0, g: 0.55, b: 0.0, a: 1.0 };

/// Label text and background colour for a reading.
pub fn describe(reading: &Reading) -> (String, Color) {
    match reading {
        Reading::Listening => ("Listening...".to_string(), IDLE),
        Reading::Detected(Verdict::NoSignal) => ("Play something!".to_string(), IDLE),
        Reading::Detected(Verdict::Pitch(estimate)) => {
            let label = format!(
                "Note: {}\nFrequency: {:.2} Hz\nCents off: {:.2}",
                estimate.note.name, estimate.frequency_hz, estimate.cents_offset
            );
            let color = if estimate.cents_offset.abs() < IN_TUNE_CENTS {
                IN_TUNE
            } else {
                OUT_OF_TUNE
            };
            (label, color)
        }
        Reading::Failed(error) => (format!("Capture error:\n{}", error), ERROR),
    }
}

pub fn create_main_view(reading: &Reading) -> Element<'static, Message> {
    let (label, background) = describe(reading);

    let cents = match reading {
        Reading::Detected(Verdict::Pitch(estimate)) => Some(estimate.cents_offset),
        _ => None,
    };

    let content = column![
        text(label).size(24).color(Color::WHITE),
        Space::with_height(12),
        CentMeter::new(cents).view(),
    ]
    .align_x(Alignment::Center)
    .padding(20);

    container(content)
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .style(move |_theme| container::Style {
            background: Some(Background::Color(background)),
            text_color: Some(Color::WHITE),
            ..container::Style::default()
        })
        .into()
}
