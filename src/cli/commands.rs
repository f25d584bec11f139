use futures::StreamExt;

use crate::app::{AppContext, Result};
use crate::cli::RangeArgs;
use crate::domain::{window, Asteroid, CacheStatus, PictureOfDay, RefreshWindow};
use crate::store::{LiveQuery, SqliteStore};

pub async fn refresh(ctx: &AppContext) -> Result<()> {
    let job = ctx.refresh_job();
    let window = job.window();
    println!("Refreshing {}..{}", window.start, window.end);

    match job.run_cycle().await {
        Ok(report) => {
            println!("Stored {} asteroids", report.stored);
            Ok(())
        }
        Err(e) => Err(e.source),
    }
}

pub async fn clear(ctx: &AppContext) -> Result<()> {
    let removed = ctx.repository.clear_all().await?;
    println!("Removed {} asteroids", removed);
    Ok(())
}

pub async fn list(ctx: &AppContext, range: RangeArgs) -> Result<()> {
    let mut query = live_query(ctx, range);
    let asteroids = query.current().await?;
    print_asteroids(&asteroids);
    Ok(())
}

/// Prints the current result, then once more per committed write, until Ctrl-C.
pub async fn watch(ctx: &AppContext, range: RangeArgs) -> Result<()> {
    let mut updates = Box::pin(live_query(ctx, range).into_stream());
    let mut first = true;
    loop {
        tokio::select! {
            update = updates.next() => match update {
                Some(result) => {
                    if !first {
                        println!("\n-- cache changed --");
                    }
                    first = false;
                    print_asteroids(&result?);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

pub async fn picture(ctx: &AppContext) -> Result<()> {
    let status = ctx.repository.load_featured_image(ctx.api_key()).await;
    let picture = ctx.repository.picture_of_day().borrow().clone();

    match (status, picture) {
        (CacheStatus::Done, Some(picture)) => {
            println!("{}", picture.title);
            println!("  {}", media_line(&picture));
            if !picture.explanation.is_empty() {
                println!("\n{}", picture.explanation);
            }
        }
        (status, _) => println!("Featured image unavailable ({})", status),
    }

    Ok(())
}

fn media_line(picture: &PictureOfDay) -> String {
    if picture.is_image() {
        picture.url.clone()
    } else {
        format!(
            "Today's entry is a {} and cannot be shown as an image: {}",
            picture.media_type, picture.url
        )
    }
}

fn live_query(ctx: &AppContext, range: RangeArgs) -> LiveQuery<SqliteStore> {
    let today = window::today();
    if range.today {
        ctx.repository.observe_today(today)
    } else if range.week {
        ctx.repository.observe_week(&RefreshWindow::week_from(today))
    } else {
        ctx.repository.observe_all()
    }
}

fn print_asteroids(asteroids: &[Asteroid]) {
    if asteroids.is_empty() {
        println!("No asteroids");
        return;
    }

    for a in asteroids {
        println!(
            "{} {:<24} {:>6.2} km/s {:>8.4} au {:>7.3} km  H={:<5.1} {}",
            a.close_approach_date,
            a.codename,
            a.relative_velocity_km_s,
            a.distance_from_earth_au,
            a.estimated_diameter_km,
            a.absolute_magnitude,
            a.hazard_label()
        );
    }
}
