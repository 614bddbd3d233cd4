//! Per-connection bookkeeping of in-flight calls.
//!
//! Success responses echo the `request_id` of the call they answer and are
//! routed by it, in any order. Error responses carry no identifier, so they
//! complete the oldest call still pending on the connection. This assumes the
//! peer reports errors in the order it received requests.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::codec::{decode, Decoded};
use super::error::RpcError;
use crate::protocol::{CallResult, CallResultOf, Protocol};

/// Value delivered to a waiting caller.
pub type Completion<P> = Result<CallResultOf<P>, RpcError>;

/// Bookkeeping for one in-flight request.
struct PendingCall<P: Protocol> {
    /// Send order on this connection, used to detect stale FIFO entries.
    seq: u64,
    sent_at: Instant,
    completion: oneshot::Sender<Completion<P>>,
}

pub struct Correlator<P: Protocol> {
    /// Connection index, for logging.
    connection: usize,
    pending: HashMap<String, PendingCall<P>>,
    /// Send order. May hold entries already resolved by id; those are
    /// skipped by matching `seq`.
    order: VecDeque<(u64, String)>,
    next_seq: u64,
    closed: bool,
}

impl<P: Protocol> Correlator<P> {
    pub fn new(connection: usize) -> Self {
        Self {
            connection,
            pending: HashMap::new(),
            order: VecDeque::new(),
            next_seq: 0,
            closed: false,
        }
    }

    /// Number of calls awaiting an answer.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Register a pending call for `request_id` and return the receiver its
    /// answer will be delivered on.
    ///
    /// # Errors
    ///
    /// - `RpcError::ConnectionClosed` once [`close`](Self::close) has run
    /// - `RpcError::DuplicateRequestId` if the id is still in flight here
    ///
    /// An id whose previous caller stopped waiting is free to reuse.
    pub fn register(&mut self, request_id: &str) -> Result<oneshot::Receiver<Completion<P>>, RpcError> {
        if self.closed {
            return Err(RpcError::ConnectionClosed);
        }
        match self.pending.get(request_id) {
            Some(call) if call.completion.is_closed() => {
                self.pending.remove(request_id);
            }
            Some(_) => return Err(RpcError::DuplicateRequestId(request_id.to_string())),
            None => {}
        }

        let (tx, rx) = oneshot::channel();
        let seq = self.next_seq;
        self.next_seq += 1;

        self.pending.insert(
            request_id.to_string(),
            PendingCall {
                seq,
                sent_at: Instant::now(),
                completion: tx,
            },
        );
        self.order.push_back((seq, request_id.to_string()));
        Ok(rx)
    }

    /// Drop the pending call for `request_id` without answering it.
    ///
    /// Returns false if nothing was pending under that id.
    pub fn cancel(&mut self, request_id: &str) -> bool {
        let removed = self.pending.remove(request_id).is_some();
        self.prune_order();
        removed
    }

    /// Drop every pending call whose receiver is gone.
    ///
    /// Returns the number of calls removed.
    pub fn remove_abandoned(&mut self) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, call| !call.completion.is_closed());
        self.prune_order();

        let removed = before - self.pending.len();
        if removed > 0 {
            debug!(
                connection = self.connection,
                "Removed {} abandoned call(s)", removed
            );
        }
        removed
    }

    /// Classify an inbound text frame and complete the call it answers.
    pub fn on_frame(&mut self, frame: &str) {
        match decode::<P>(frame) {
            Decoded::Error(error) => {
                if !self.resolve_oldest(Ok(CallResult::Error(error))) {
                    debug!(
                        connection = self.connection,
                        "Discarding error response with no pending call"
                    );
                }
            }
            Decoded::Response(response) => match P::response_request_id(&response).map(str::to_string) {
                Some(id) => {
                    if !self.resolve_by_id(&id, Ok(CallResult::Data(response))) {
                        debug!(
                            connection = self.connection,
                            request_id = %id,
                            "Discarding response for unknown or already resolved request"
                        );
                    }
                }
                None => {
                    if !self.resolve_oldest(Ok(CallResult::Data(response))) {
                        debug!(
                            connection = self.connection,
                            "Discarding uncorrelated response with no pending call"
                        );
                    }
                }
            },
            Decoded::Undecodable(reason) => {
                warn!(connection = self.connection, "Undecodable frame: {}", reason);
                self.resolve_oldest(Ok(CallResult::Error(P::decode_failure(reason))));
            }
        }
    }

    /// Complete the oldest pending call with a non-text-message error.
    pub fn on_binary_frame(&mut self) {
        warn!(connection = self.connection, "Received a non-text frame");
        self.resolve_oldest(Ok(CallResult::Error(P::non_text_message())));
    }

    /// Mark the connection closed and fail every pending call.
    ///
    /// Later registrations fail with `RpcError::ConnectionClosed`.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let failed = self.pending.len();
        for (_, call) in self.pending.drain() {
            let _ = call.completion.send(Err(RpcError::ConnectionClosed));
        }
        self.order.clear();

        if failed > 0 {
            warn!(
                connection = self.connection,
                "Connection closed with {} pending call(s)", failed
            );
        }
    }

    fn resolve_by_id(&mut self, request_id: &str, completion: Completion<P>) -> bool {
        let Some(call) = self.pending.remove(request_id) else {
            return false;
        };
        self.prune_order();
        self.complete(request_id, call, completion);
        true
    }

    fn resolve_oldest(&mut self, completion: Completion<P>) -> bool {
        while let Some((seq, id)) = self.order.pop_front() {
            let live = self.pending.get(&id).is_some_and(|call| call.seq == seq);
            if !live {
                continue;
            }
            if let Some(call) = self.pending.remove(&id) {
                self.complete(&id, call, completion);
                return true;
            }
        }
        false
    }

    fn complete(&self, request_id: &str, call: PendingCall<P>, completion: Completion<P>) {
        debug!(
            connection = self.connection,
            request_id = %request_id,
            elapsed_ms = call.sent_at.elapsed().as_millis() as u64,
            "Call resolved"
        );
        // The caller may have given up (timeout or dropped future).
        let _ = call.completion.send(completion);
    }

    /// Pop resolved entries off the front of the send order.
    fn prune_order(&mut self) {
        while let Some((seq, id)) = self.order.front() {
            let live = self.pending.get(id).is_some_and(|call| call.seq == *seq);
            if live {
                break;
            }
            self.order.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ErrorResponse, Response};
    use crate::protocol::TableProtocol;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::sync::oneshot::error::TryRecvError;

    type Rx = oneshot::Receiver<Completion<TableProtocol>>;

    fn get_row_reply(id: &str) -> String {
        json!({"type": "GetRow", "table": "employees", "row": {"EmployeeId": 1}, "request_id": id})
            .to_string()
    }

    fn table_not_found(table: &str) -> String {
        json!({"type": "TableNotFound", "table": table}).to_string()
    }

    fn take(rx: &mut Rx) -> CallResultOf<TableProtocol> {
        match rx.try_recv() {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => panic!("Expected an answer, got local error: {}", e),
            Err(e) => panic!("Expected a resolved call, got: {:?}", e),
        }
    }

    fn assert_unresolved(rx: &mut Rx) {
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_success_routes_by_id_only() {
        let mut correlator = Correlator::<TableProtocol>::new(0);
        let mut a = correlator.register("a").unwrap();
        let mut b = correlator.register("b").unwrap();
        let mut c = correlator.register("c").unwrap();

        correlator.on_frame(&get_row_reply("b"));

        assert_unresolved(&mut a);
        assert_unresolved(&mut c);
        match take(&mut b) {
            CallResult::Data(response) => assert_eq!(response.request_id(), Some("b")),
            other => panic!("Expected data, got {:?}", other),
        }
        assert_eq!(correlator.pending_count(), 2);
    }

    #[test]
    fn test_out_of_order_successes() {
        let mut correlator = Correlator::<TableProtocol>::new(0);
        let mut first = correlator.register("first").unwrap();
        let mut second = correlator.register("second").unwrap();

        correlator.on_frame(&get_row_reply("second"));
        correlator.on_frame(&get_row_reply("first"));

        assert!(take(&mut first).is_data());
        assert!(take(&mut second).is_data());
        assert_eq!(correlator.pending_count(), 0);
    }

    #[test]
    fn test_errors_resolve_in_send_order() {
        let mut correlator = Correlator::<TableProtocol>::new(0);
        let mut receivers: Vec<Rx> = ["r0", "r1", "r2", "r3"]
            .iter()
            .map(|id| correlator.register(id).unwrap())
            .collect();

        correlator.on_frame(&table_not_found("t0"));
        correlator.on_frame(&table_not_found("t1"));
        correlator.on_frame(&table_not_found("t2"));

        for (i, rx) in receivers.iter_mut().take(3).enumerate() {
            assert_eq!(
                take(rx),
                CallResult::Error(ErrorResponse::TableNotFound {
                    table: format!("t{}", i)
                })
            );
        }
        assert_unresolved(&mut receivers[3]);
    }

    #[test]
    fn test_error_skips_calls_resolved_by_id() {
        let mut correlator = Correlator::<TableProtocol>::new(0);
        let mut a = correlator.register("a").unwrap();
        let mut b = correlator.register("b").unwrap();

        correlator.on_frame(&get_row_reply("a"));
        correlator.on_frame(&json!({"type": "RowNotFound"}).to_string());

        assert!(take(&mut a).is_data());
        assert_eq!(take(&mut b), CallResult::Error(ErrorResponse::RowNotFound));
    }

    #[test]
    fn test_reused_id_keeps_its_place_in_line() {
        let mut correlator = Correlator::<TableProtocol>::new(0);
        let mut old = correlator.register("x").unwrap();
        let mut other = correlator.register("y").unwrap();
        correlator.on_frame(&get_row_reply("x"));
        assert!(take(&mut old).is_data());

        // "x" is reused after resolution; "y" is still the oldest call.
        let mut reused = correlator.register("x").unwrap();
        correlator.on_frame(&json!({"type": "DatabaseError"}).to_string());

        assert_eq!(take(&mut other), CallResult::Error(ErrorResponse::DatabaseError));
        assert_unresolved(&mut reused);
    }

    #[test]
    fn test_duplicate_frame_is_noop() {
        let mut correlator = Correlator::<TableProtocol>::new(0);
        let mut a = correlator.register("a").unwrap();
        let mut b = correlator.register("b").unwrap();

        correlator.on_frame(&get_row_reply("a"));
        correlator.on_frame(&get_row_reply("a"));

        assert!(take(&mut a).is_data());
        assert_unresolved(&mut b);
        assert_eq!(correlator.pending_count(), 1);
    }

    #[test]
    fn test_unmatched_frames_without_pending_calls() {
        let mut correlator = Correlator::<TableProtocol>::new(0);
        correlator.on_frame(&get_row_reply("ghost"));
        correlator.on_frame(&table_not_found("cats"));
        correlator.on_frame("not json");
        assert_eq!(correlator.pending_count(), 0);
    }

    #[test]
    fn test_duplicate_live_id_rejected() {
        let mut correlator = Correlator::<TableProtocol>::new(0);
        let _a = correlator.register("a").unwrap();

        let result = correlator.register("a");
        assert!(matches!(result, Err(RpcError::DuplicateRequestId(id)) if id == "a"));
    }

    #[test]
    fn test_undecodable_frame_fails_oldest_call() {
        let mut correlator = Correlator::<TableProtocol>::new(0);
        let mut a = correlator.register("a").unwrap();
        let mut b = correlator.register("b").unwrap();

        correlator.on_frame(r#"{"type":"Mystery"}"#);

        match take(&mut a) {
            CallResult::Error(ErrorResponse::BadRequest { message }) => {
                assert!(message.contains("Mystery"), "Unexpected message: {}", message)
            }
            other => panic!("Expected BadRequest, got {:?}", other),
        }
        assert_unresolved(&mut b);
    }

    #[test]
    fn test_binary_frame_fails_oldest_call() {
        let mut correlator = Correlator::<TableProtocol>::new(0);
        let mut a = correlator.register("a").unwrap();

        correlator.on_binary_frame();

        assert_eq!(take(&mut a), CallResult::Error(ErrorResponse::NonTextMessage));
    }

    #[test]
    fn test_response_without_id_answers_oldest() {
        let mut correlator = Correlator::<TableProtocol>::new(0);
        let mut a = correlator.register("a").unwrap();

        correlator.on_frame(r#"{"type":"DeleteRow","table":"albums","deleted_rows":1}"#);

        assert_eq!(
            take(&mut a),
            CallResult::Data(Response::DeleteRow {
                table: "albums".into(),
                deleted_rows: 1,
                request_id: None,
            })
        );
    }

    #[test]
    fn test_cancel_removes_pending_call() {
        let mut correlator = Correlator::<TableProtocol>::new(0);
        let _a = correlator.register("a").unwrap();
        let mut b = correlator.register("b").unwrap();

        assert!(correlator.cancel("a"));
        assert!(!correlator.cancel("a"));

        // The late reply for "a" is discarded; the next error goes to "b".
        correlator.on_frame(&get_row_reply("a"));
        correlator.on_frame(&table_not_found("cats"));
        assert_eq!(
            take(&mut b),
            CallResult::Error(ErrorResponse::TableNotFound { table: "cats".into() })
        );
    }

    #[test]
    fn test_close_fails_pending_and_future_calls() {
        let mut correlator = Correlator::<TableProtocol>::new(0);
        let mut a = correlator.register("a").unwrap();
        let mut b = correlator.register("b").unwrap();

        correlator.close();

        assert!(correlator.is_closed());
        assert!(matches!(a.try_recv(), Ok(Err(RpcError::ConnectionClosed))));
        assert!(matches!(b.try_recv(), Ok(Err(RpcError::ConnectionClosed))));
        assert!(matches!(correlator.register("c"), Err(RpcError::ConnectionClosed)));

        // Idempotent.
        correlator.close();
        assert_eq!(correlator.pending_count(), 0);
    }

    #[test]
    fn test_remove_abandoned_keeps_live_calls() {
        let mut correlator = Correlator::<TableProtocol>::new(0);
        let abandoned = correlator.register("a").unwrap();
        let mut live = correlator.register("b").unwrap();
        drop(abandoned);

        assert_eq!(correlator.remove_abandoned(), 1);
        assert_eq!(correlator.pending_count(), 1);
        assert_eq!(correlator.order.len(), 1);

        correlator.on_frame(&get_row_reply("b"));
        assert!(take(&mut live).is_data());
        assert!(correlator.order.is_empty());
    }

    #[test]
    fn test_abandoned_id_can_be_registered_again() {
        let mut correlator = Correlator::<TableProtocol>::new(0);
        drop(correlator.register("x").unwrap());

        let mut again = correlator.register("x").expect("Abandoned id should be reusable");
        assert_eq!(correlator.pending_count(), 1);

        correlator.on_frame(&get_row_reply("x"));
        assert!(take(&mut again).is_data());
    }

    #[test]
    fn test_resolution_after_caller_dropped() {
        let mut correlator = Correlator::<TableProtocol>::new(0);
        let a = correlator.register("a").unwrap();
        drop(a);

        correlator.on_frame(&get_row_reply("a"));
        assert_eq!(correlator.pending_count(), 0);
    }
}
