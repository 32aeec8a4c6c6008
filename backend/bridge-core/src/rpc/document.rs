//! Script payload installed into the document before any bridge traffic.
//!
//! It defines `window.agWebView.rpc` with `invoke`, `handle`, `batch`, the
//! `_dispatch`/`_onResponse` entry points the host pushes into, and
//! `_createAsyncIterable` for streamed results. Installing it twice is a no-op.

use crate::rpc::channel::OutboundMessage;

pub const RPC_RUNTIME_SCRIPT: &str = r#"(function() {
    if (window.agWebView && window.agWebView.rpc) return;
    if (!window.agWebView) window.agWebView = {};
    var pending = {};
    var handlers = {};
    var nextId = 0;
    function post(msg) {
        if (window.chrome && window.chrome.webview) {
            window.chrome.webview.postMessage(msg);
        } else if (window.webkit && window.webkit.messageHandlers && window.webkit.messageHandlers.agibuildWebView) {
            window.webkit.messageHandlers.agibuildWebView.postMessage(msg);
        } else if (window.agWebView.socket) {
            window.agWebView.socket.send(msg);
        }
    }
    function errorReply(id, e) {
        return { jsonrpc: '2.0', id: id, error: { code: (e && e.code) || -32603, message: (e && e.message) || 'Error' } };
    }
    function nextCallId() {
        return '__js_' + (nextId++);
    }
    function track(id) {
        return new Promise(function(resolve, reject) {
            pending[id] = { resolve: resolve, reject: reject };
        });
    }
    function resolveItem(msg) {
        var p = pending[msg.id];
        if (!p) return;
        delete pending[msg.id];
        if (msg.error) {
            var err = new Error(msg.error.message || 'RPC error');
            err.code = msg.error.code;
            p.reject(err);
        } else {
            p.resolve(msg.result);
        }
    }
    function runHandler(msg) {
        var handler = handlers[msg.method];
        if (!handler) {
            if (msg.id === undefined) return Promise.resolve(null);
            return Promise.resolve({ jsonrpc: '2.0', id: msg.id, error: { code: -32601, message: 'Method not found: ' + msg.method } });
        }
        return new Promise(function(resolve) {
            resolve(handler(msg.params));
        }).then(function(r) {
            if (msg.id === undefined) return null;
            return { jsonrpc: '2.0', id: msg.id, result: r };
        }, function(e) {
            if (msg.id === undefined) return null;
            return errorReply(msg.id, e);
        });
    }
    window.agWebView.rpc = {
        invoke: function(method, params, signal) {
            var id = nextCallId();
            var result = track(id);
            post(JSON.stringify({ jsonrpc: '2.0', id: id, method: method, params: params }));
            if (signal) {
                var onAbort = function() {
                    post(JSON.stringify({ jsonrpc: '2.0', method: '$/cancelRequest', params: { id: id } }));
                };
                if (signal.aborted) {
                    onAbort();
                } else {
                    signal.addEventListener('abort', onAbort, { once: true });
                }
            }
            return result;
        },
        batch: function(calls) {
            if (!calls || calls.length === 0) return Promise.resolve([]);
            var envelopes = [];
            var resultPromises = [];
            for (var i = 0; i < calls.length; i++) {
                var id = nextCallId();
                resultPromises.push(track(id).then(function(r) {
                    return { ok: true, value: r };
                }, function(e) {
                    return { ok: false, error: e };
                }));
                envelopes.push({ jsonrpc: '2.0', id: id, method: calls[i].method, params: calls[i].params });
            }
            post(JSON.stringify(envelopes));
            return Promise.all(resultPromises);
        },
        handle: function(method, handler) {
            if (handler) {
                handlers[method] = handler;
            } else {
                delete handlers[method];
            }
        },
        _dispatch: function(jsonStr) {
            var msg = JSON.parse(jsonStr);
            if (Array.isArray(msg)) {
                Promise.all(msg.map(runHandler)).then(function(replies) {
                    var answered = replies.filter(function(r) { return r !== null; });
                    if (answered.length > 0) post(JSON.stringify(answered));
                });
                return;
            }
            runHandler(msg).then(function(reply) {
                if (reply !== null) post(JSON.stringify(reply));
            });
        },
        _onResponse: function(jsonStr) {
            var msg = JSON.parse(jsonStr);
            if (Array.isArray(msg)) {
                for (var i = 0; i < msg.length; i++) resolveItem(msg[i]);
            } else {
                resolveItem(msg);
            }
        },
        _createAsyncIterable: function(method, params) {
            var rpc = window.agWebView.rpc;
            return {
                [Symbol.asyncIterator]: function() {
                    var token = null;
                    var buffer = [];
                    var done = false;
                    var initPromise = rpc.invoke(method, params).then(function(r) {
                        token = r.token;
                        if (r.values) { for (var i = 0; i < r.values.length; i++) buffer.push(r.values[i]); }
                        if (r.finished) done = true;
                    });
                    return {
                        next: function() {
                            return initPromise.then(function() {
                                if (buffer.length > 0) return { value: buffer.shift(), done: false };
                                if (done) return { value: undefined, done: true };
                                return rpc.invoke('$/enumerator/next/' + token).then(function(r) {
                                    if (r.finished) { done = true; return { value: undefined, done: true }; }
                                    if (r.values && r.values.length > 0) return { value: r.values[0], done: false };
                                    return { value: undefined, done: true };
                                });
                            });
                        },
                        return: function() {
                            if (token && !done) {
                                done = true;
                                post(JSON.stringify({ jsonrpc: '2.0', method: '$/enumerator/abort', params: { token: token } }));
                            }
                            return Promise.resolve({ value: undefined, done: true });
                        }
                    };
                }
            };
        }
    };
})();"#;

/// The runtime as a message ready to push into a freshly loaded document.
pub fn runtime_message() -> OutboundMessage {
    OutboundMessage::Script(RPC_RUNTIME_SCRIPT.to_string())
}
