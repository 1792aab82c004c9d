use std::io;

use log::debug;
use tokio::{
    io::{copy, split, AsyncRead, AsyncWrite},
    select,
};

/// The side whose read half reached end-of-stream first, together with the
/// number of bytes that side sent across the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closed {
    Left(u64),
    Right(u64),
}

/// Copies bytes in both directions between `left` and `right` until either
/// direction finishes or fails.
///
/// The remaining direction is abandoned at that point and both streams are
/// dropped, which closes them. Bytes are relayed as-is.
pub async fn bridge<L, R>(left: L, right: R) -> io::Result<Closed>
where
    L: AsyncRead + AsyncWrite,
    R: AsyncRead + AsyncWrite,
{
    let (mut left_read, mut left_write) = split(left);
    let (mut right_read, mut right_write) = split(right);

    let closed = select! {
        sent = copy(&mut left_read, &mut right_write) => Closed::Left(sent?),
        sent = copy(&mut right_read, &mut left_write) => Closed::Right(sent?),
    };

    debug!("bridge finished: {closed:?}");
    Ok(closed)
}
