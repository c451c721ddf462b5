#![allow(dead_code)]

use bytes::Bytes;
use futures::{stream::BoxStream, StreamExt};
use typeknit::{Body, BodyError, Request, Response, Router};

pub fn post(path: &str, body: impl Into<Body>) -> Request {
    http::Request::post(path).body(body.into()).unwrap()
}

pub async fn text(resp: Response) -> String {
    let body = resp.into_body().collect(usize::MAX).await.unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

pub async fn exec<TCtx: Send + 'static>(
    router: &Router<TCtx>,
    ctx: TCtx,
    path: &str,
    body: &'static str,
) -> (u16, String) {
    let resp = router.dispatch(ctx, post(path, body)).await;
    let status = resp.status().as_u16();
    (status, text(resp).await)
}

pub fn frames(resp: Response) -> BoxStream<'static, Result<Bytes, BodyError>> {
    resp.into_body().into_stream()
}

pub async fn next_frame(frames: &mut BoxStream<'static, Result<Bytes, BodyError>>) -> Option<String> {
    let frame = frames.next().await?.unwrap();
    Some(String::from_utf8(frame.to_vec()).unwrap())
}
