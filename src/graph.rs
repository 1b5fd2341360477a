#![cfg(not(tarpaulin_include))]
#![cfg(feature = "web")]
use crate::reports::DailyRevenue;
use image::{ImageOutputFormat, RgbImage};
use plotters::prelude::*;
use std::io::Cursor;

/// Configuration options for chart generation
#[derive(Clone, Debug)]
pub struct GraphOptions {
    /// Width of the chart in pixels
    pub width: u32,

    /// Height of the chart in pixels
    pub height: u32,

    /// Number of horizontal guide lines drawn behind the bars
    pub guides: u32,
}

impl Default for GraphOptions {
    /// 800x400 pixels with four guide lines
    fn default() -> Self {
        Self {
            width: 800,
            height: 400,
            guides: 4,
        }
    }
}

/// Creates a bar chart of daily revenue
///
/// One bar per day, oldest on the left. Days without sales are not drawn,
/// so the caller decides whether to pad the series.
///
/// # Arguments
/// * `days` - Revenue per day, as produced by [`crate::reports::summarize`]
/// * `options` - Chart size
///
/// # Returns
/// * A Result containing the PNG image data as bytes or an error
pub fn revenue_chart(
    days: &[DailyRevenue],
    options: &GraphOptions,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let (width, height) = (options.width.max(1), options.height.max(1));
    let mut pixels = vec![0u8; (width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut pixels, (width, height)).into_drawing_area();
        root.fill(&WHITE)?;

        let count = days.len().max(1) as i32;
        let max_y = days.iter().map(|d| d.revenue).max().unwrap_or(0).max(1);
        // Headroom above the tallest bar
        let top = max_y + max_y / 10 + 1;

        let mut chart = ChartBuilder::on(&root)
            .margin(20)
            .build_cartesian_2d(0..count * 10, 0..top)?;

        for i in 1..=options.guides as i64 {
            let y = top * i / (options.guides as i64 + 1);
            chart.draw_series(LineSeries::new(
                vec![(0, y), (count * 10, y)],
                &RGBColor(220, 220, 220),
            ))?;
        }

        chart.draw_series(days.iter().enumerate().map(|(i, day)| {
            let x = i as i32 * 10;
            Rectangle::new([(x + 2, 0), (x + 8, day.revenue)], RGBColor(230, 126, 34).filled())
        }))?;

        chart.draw_series(LineSeries::new(vec![(0, 0), (count * 10, 0)], &BLACK))?;

        root.present()?;
    }

    let image = RgbImage::from_raw(width, height, pixels)
        .ok_or("chart buffer does not match its dimensions")?;
    let mut png = Cursor::new(Vec::new());
    image.write_to(&mut png, ImageOutputFormat::Png)?;
    Ok(png.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn renders_a_png() {
        let days: Vec<DailyRevenue> = (1..=7)
            .map(|d| DailyRevenue {
                date: NaiveDate::from_ymd_opt(2024, 6, d).unwrap(),
                orders: d as usize,
                revenue: i64::from(d) * 10_000,
            })
            .collect();
        let png = revenue_chart(&days, &GraphOptions::default()).unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }

    #[test]
    fn empty_series_still_renders() {
        let options = GraphOptions {
            width: 200,
            height: 100,
            guides: 0,
        };
        assert!(!revenue_chart(&[], &options).unwrap().is_empty());
    }
}
