//! # Cent Meter Widget
//!
//! A horizontal bar with a needle showing how far the detected pitch is
//! from the nearest note.

use iced::widget::canvas::{self, Geometry, Path, Stroke};
use iced::widget::container;
use iced::{mouse, Color, Element, Point, Rectangle, Renderer, Size, Theme};

/// The meter shows deviations from -50 to +50 cents, i.e. up to the next note.
const METER_RANGE: f32 = 50.0;

pub struct CentMeter {
    /// Current cent deviation (None if no pitch detected)
    cents: Option<f32>,
}

impl CentMeter {
    pub fn new(cents: Option<f32>) -> Self {
        Self { cents }
    }

    pub fn view(self) -> Element<'static, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fill)
                .height(iced::Length::Fixed(24.0)),
        )
        .into()
    }
}

/// Horizontal needle position for `cents` on a meter `width` pixels wide.
pub fn needle_position(cents: f32, width: f32) -> f32 {
    let clamped = cents.clamp(-METER_RANGE, METER_RANGE);
    (clamped + METER_RANGE) / (2.0 * METER_RANGE) * width
}

impl<Message> canvas::Program<Message> for CentMeter {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());

        let background = Path::rectangle(Point::ORIGIN, bounds.size());
        frame.fill(&background, Color::from_rgba(0.0, 0.0, 0.0, 0.35));

        let center_x = bounds.width / 2.0;
        let center_line = Path::line(
            Point::new(center_x, 0.0),
            Point::new(center_x, bounds.height),
        );
        frame.stroke(
            &center_line,
            Stroke::default().with_width(2.0).with_color(Color::WHITE),
        );

        if let Some(c) = self.cents {
            let x = needle_position(c, bounds.width);
            let needle = Path::rectangle(Point::new(x - 2.0, 0.0), Size::new(4.0, bounds.height));
            frame.fill(&needle, Color::WHITE);
        }

        vec![frame.into_geometry()]
    }
}
