use time::OffsetDateTime;

/// A post as returned by a platform search. Read-only to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    /// Platform id, used to expand deferred comments.
    pub id: String,
    /// `None` marks a malformed post; analysis refuses to invent one.
    pub title: Option<String>,
    pub url: String,
    /// `None` when the platform gave no usable timestamp.
    pub created_at: Option<OffsetDateTime>,
    pub comments: Comments,
}

/// Top-level comments of a post, in platform order.
#[derive(Debug, Clone, PartialEq)]
pub enum Comments {
    Loaded(Vec<Comment>),
    /// Not fetched yet; expand through a [`crate::CommentSource`].
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub body: Option<String>,
}

impl Comment {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
        }
    }

    /// A comment with no body, like a "load more" stub.
    pub fn without_body() -> Self {
        Self { body: None }
    }
}

impl Post {
    /// Build a post whose comments are already known.
    ///
    /// ```
    /// use pulse_social::{Comment, Comments, Post};
    ///
    /// let post = Post::new("abc", "Tesla ships", "https://example.com/abc", None)
    ///     .with_comments(vec![Comment::new("great")]);
    /// assert_eq!(post.title.as_deref(), Some("Tesla ships"));
    /// assert!(matches!(post.comments, Comments::Loaded(ref c) if c.len() == 1));
    /// ```
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        created_at: Option<OffsetDateTime>,
    ) -> Self {
        Self {
            id: id.into(),
            title: Some(title.into()),
            url: url.into(),
            created_at,
            comments: Comments::Loaded(Vec::new()),
        }
    }

    pub fn with_comments(mut self, comments: Vec<Comment>) -> Self {
        self.comments = Comments::Loaded(comments);
        self
    }

    pub fn with_deferred_comments(mut self) -> Self {
        self.comments = Comments::Deferred;
        self
    }
}
