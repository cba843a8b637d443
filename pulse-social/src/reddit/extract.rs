use time::OffsetDateTime;

use crate::post::{Comment, Comments, Post};
use crate::reddit::types::{CommentData, LinkData, Listing, KIND_COMMENT, KIND_LINK};

const REDDIT_WEB: &str = "https://www.reddit.com";

/// Convert Reddit's float epoch seconds; non-finite or out-of-range values give `None`.
pub fn unix_seconds_to_datetime(secs: f64) -> Option<OffsetDateTime> {
    if !secs.is_finite() {
        return None;
    }
    let nanos = (secs * 1e9).round();
    if nanos.abs() > i128::MAX as f64 {
        return None;
    }
    OffsetDateTime::from_unix_timestamp_nanos(nanos as i128).ok()
}

/// Map a search result to a [`Post`]. Comments stay deferred until analysis.
pub fn link_to_post(link: LinkData) -> Post {
    let url = link
        .url
        .filter(|u| !u.is_empty())
        .or_else(|| link.permalink.map(|p| format!("{REDDIT_WEB}{p}")))
        .unwrap_or_default();

    Post {
        id: link.id,
        title: link.title,
        url,
        created_at: link.created_utc.and_then(unix_seconds_to_datetime),
        comments: Comments::Deferred,
    }
}

/// Posts from a search listing, in listing order. Non-link children are ignored.
pub fn posts_from_listing(listing: Listing<LinkData>) -> Vec<Post> {
    listing
        .data
        .children
        .into_iter()
        .filter(|child| child.kind == KIND_LINK)
        .map(|child| link_to_post(child.data))
        .collect()
}

/// Top-level comments from a `comments/{id}` response.
///
/// The response is `[link listing, comment listing]`. "Load more" stubs are dropped,
/// the same as expanding with no extra requests.
pub fn comments_from_thread(thread: Vec<Listing<CommentData>>) -> Vec<Comment> {
    thread
        .into_iter()
        .nth(1)
        .map(|listing| {
            listing
                .data
                .children
                .into_iter()
                .filter(|child| child.kind == KIND_COMMENT)
                .map(|child| Comment {
                    body: child.data.body,
                })
                .collect()
        })
        .unwrap_or_default()
}
