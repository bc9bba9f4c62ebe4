//! Generation of the bootstrap script loaded ahead of every sample.
//!
//! The script installs, in order: the module hook that serves mocks and
//! resolves real imports against the manuscript's `node_modules`, the test
//! primitives, the configured globals, and the teardown hooks.

use std::fmt::Write as _;
use std::path::Path;

use crate::environment::{Environment, Global};

/// Module hook. `MODULE_ROOT` and the `mocks` map are defined ahead of it.
const MODULE_HOOK: &str = r#"
const mockCache = new Map();
const originalLoad = Module._load;
Module._load = function load(request, parent, isMain) {
  // `node:fs` is served by a mock registered as `fs`.
  const key = !mocks.has(request) && request.startsWith('node:') ? request.slice(5) : request;
  if (mocks.has(key)) {
    if (!mockCache.has(key)) {
      mockCache.set(key, mocks.get(key)());
    }
    return mockCache.get(key);
  }
  try {
    return originalLoad.call(this, request, parent, isMain);
  } catch (error) {
    if (!error || error.code !== 'MODULE_NOT_FOUND') {
      throw error;
    }
    let resolved;
    try {
      resolved = require.resolve(request, { paths: [MODULE_ROOT] });
    } catch {
      throw error;
    }
    return originalLoad.call(this, resolved, parent, isMain);
  }
};
"#;

/// Assertion and mocking primitives every sample can use.
const PRIMITIVES: &str = r#"
class AssertionError extends Error {
  constructor(message) {
    super(message);
    this.name = 'AssertionError';
  }
}

const inspect = (value) => util.inspect(value, { depth: 4 });

const track = (value) => {
  if (value && typeof value.then === 'function') {
    __folio.pending.push(Promise.resolve(value));
  }
  return value;
};

function equals(a, b) {
  if (Object.is(a, b)) return true;
  if (a instanceof Date && b instanceof Date) return a.getTime() === b.getTime();
  if (a instanceof Map || a instanceof Set || b instanceof Map || b instanceof Set) {
    return util.isDeepStrictEqual(a, b);
  }
  if (typeof a !== 'object' || typeof b !== 'object' || a === null || b === null) {
    return false;
  }
  if (Array.isArray(a) !== Array.isArray(b)) return false;
  if (Array.isArray(a)) {
    return a.length === b.length && a.every((item, i) => equals(item, b[i]));
  }
  const keys = (o) => Object.keys(o).filter((k) => o[k] !== undefined);
  const ka = keys(a);
  const kb = keys(b);
  return ka.length === kb.length && ka.every((k) => equals(a[k], b[k]));
}

function test(...args) {
  if (typeof args[0] === 'string' && typeof args[1] === 'function') {
    return track(args[1]());
  }
  if (typeof args[0] === 'function') {
    return track(args[0]());
  }
  const [condition, message] = args;
  if (condition && typeof condition.then === 'function') {
    return track(
      condition.then((value) => {
        if (!value) throw new AssertionError(message || 'expected promise to resolve truthy');
      })
    );
  }
  if (!condition) {
    throw new AssertionError(message || `expected a truthy value, got ${inspect(condition)}`);
  }
}
test.skip = () => {};

function describe(name, body) {
  return track(body());
}

function expect(actual) {
  const make = (negated) => {
    const check = (pass, message) => {
      if (Boolean(pass) === negated) {
        throw new AssertionError(negated ? `not: ${message}` : message);
      }
    };
    const show = inspect(actual);
    return {
      toBe: (expected) => check(Object.is(actual, expected), `expected ${show} to be ${inspect(expected)}`),
      toEqual: (expected) => check(equals(actual, expected), `expected ${show} to equal ${inspect(expected)}`),
      toStrictEqual: (expected) =>
        check(util.isDeepStrictEqual(actual, expected), `expected ${show} to strictly equal ${inspect(expected)}`),
      toBeTruthy: () => check(actual, `expected ${show} to be truthy`),
      toBeFalsy: () => check(!actual, `expected ${show} to be falsy`),
      toBeNull: () => check(actual === null, `expected ${show} to be null`),
      toBeUndefined: () => check(actual === undefined, `expected ${show} to be undefined`),
      toBeDefined: () => check(actual !== undefined, `expected ${show} to be defined`),
      toBeNaN: () => check(Number.isNaN(actual), `expected ${show} to be NaN`),
      toBeGreaterThan: (n) => check(actual > n, `expected ${show} > ${n}`),
      toBeGreaterThanOrEqual: (n) => check(actual >= n, `expected ${show} >= ${n}`),
      toBeLessThan: (n) => check(actual < n, `expected ${show} < ${n}`),
      toBeLessThanOrEqual: (n) => check(actual <= n, `expected ${show} <= ${n}`),
      toBeInstanceOf: (type) => check(actual instanceof type, `expected ${show} to be an instance of ${type.name}`),
      toContain: (item) =>
        check(
          typeof actual === 'string' ? actual.includes(item) : Array.from(actual).includes(item),
          `expected ${show} to contain ${inspect(item)}`
        ),
      toHaveLength: (n) => check(actual != null && actual.length === n, `expected ${show} to have length ${n}`),
      toHaveProperty: (key, ...value) =>
        check(
          actual != null && key in Object(actual) && (value.length === 0 || equals(actual[key], value[0])),
          `expected ${show} to have property ${key}`
        ),
      toMatch: (pattern) =>
        check(
          typeof pattern === 'string' ? String(actual).includes(pattern) : pattern.test(String(actual)),
          `expected ${show} to match ${pattern}`
        ),
      toThrow: (expected) => {
        let thrown;
        let threw = false;
        try {
          actual();
        } catch (error) {
          thrown = error;
          threw = true;
        }
        const message = thrown && thrown.message !== undefined ? thrown.message : String(thrown);
        let matches = threw;
        if (threw && typeof expected === 'string') matches = message.includes(expected);
        if (threw && expected instanceof RegExp) matches = expected.test(message);
        if (threw && typeof expected === 'function') matches = thrown instanceof expected;
        check(matches, `expected function to throw${expected === undefined ? '' : ` ${inspect(expected)}`}`);
      },
      toHaveBeenCalled: () => check(actual.mock.calls.length > 0, 'expected mock to have been called'),
      toHaveBeenCalledTimes: (n) =>
        check(actual.mock.calls.length === n, `expected ${n} calls, got ${actual.mock.calls.length}`),
      toHaveBeenCalledWith: (...args) =>
        check(
          actual.mock.calls.some((call) => equals(call, args)),
          `expected mock to have been called with ${inspect(args)}`
        ),
    };
  };

  const matchers = make(false);
  matchers.not = make(true);
  const settle = (onValue, onError) =>
    new Proxy(
      {},
      {
        get: (_, name) => (...args) => track(Promise.resolve(actual).then(onValue(name, args), onError(name, args))),
      }
    );
  matchers.resolves = settle(
    (name, args) => (value) => expect(value)[name](...args),
    () => (error) => {
      throw new AssertionError(`expected promise to resolve, it rejected with ${inspect(error)}`);
    }
  );
  matchers.rejects = settle(
    () => (value) => {
      throw new AssertionError(`expected promise to reject, it resolved with ${inspect(value)}`);
    },
    (name, args) => (error) =>
      name === 'toThrow'
        ? expect(() => {
            throw error;
          }).toThrow(...args)
        : expect(error)[name](...args)
  );
  return matchers;
}

function fn(implementation = () => undefined) {
  let current = implementation;
  const mock = function (...args) {
    mock.mock.calls.push(args);
    const value = current.apply(this, args);
    mock.mock.results.push({ type: 'return', value });
    return value;
  };
  mock.mock = { calls: [], results: [] };
  mock.mockImplementation = (next) => {
    current = next;
    return mock;
  };
  mock.mockReturnValue = (value) => mock.mockImplementation(() => value);
  mock.mockResolvedValue = (value) => mock.mockImplementation(() => Promise.resolve(value));
  mock.mockClear = () => {
    mock.mock.calls = [];
    mock.mock.results = [];
    return mock;
  };
  return mock;
}

function spyOn(object, method) {
  const original = object[method];
  const spy = fn(function (...args) {
    return original.apply(this, args);
  });
  spy.mockRestore = () => {
    object[method] = original;
  };
  object[method] = spy;
  return spy;
}

const vi = { fn, spyOn };
Object.assign(globalThis, { AssertionError, test, it: test, describe, expect, vi, jest: vi });

function defineLazy(name, load) {
  const settle = (value) =>
    Object.defineProperty(globalThis, name, { value, writable: true, configurable: true });
  Object.defineProperty(globalThis, name, {
    configurable: true,
    get() {
      const value = load();
      settle(value);
      __folio.loaded.add(name);
      return value;
    },
    set: settle,
  });
}
"#;

fn js_string(value: &str) -> String {
    // A JSON string is a valid JavaScript string literal.
    serde_json::Value::String(value.to_string()).to_string()
}

fn js_path(path: &Path) -> String {
    js_string(&path.to_string_lossy())
}

fn global_loader(global: &Global) -> String {
    match global {
        Global::Module(module) => format!("() => require({})", js_string(module)),
        Global::Export { module, export } => {
            format!("() => require({})[{}]", js_string(module), js_string(export))
        }
        Global::Expr { expr } => format!("() => ({})", expr),
    }
}

/// Render the bootstrap script for `env`.
pub fn render(env: &Environment) -> String {
    let mut out = String::new();
    out.push_str("'use strict';\nconst Module = require('module');\nconst util = require('util');\n\n");
    out.push_str("const __folio = { loaded: new Set(), pending: [], teardown: [] };\n");
    out.push_str("Object.defineProperty(globalThis, '__folio', { value: __folio });\n");
    let _ = writeln!(out, "const MODULE_ROOT = {};", js_path(&env.module_root));

    out.push_str("\nconst mocks = new Map();\n");
    for (module, expr) in &env.mocks {
        let _ = writeln!(out, "mocks.set({}, () => ({}));", js_string(module), expr);
    }
    out.push_str(MODULE_HOOK);
    out.push_str(PRIMITIVES);

    out.push('\n');
    for (name, global) in &env.globals {
        let _ = writeln!(out, "defineLazy({}, {});", js_string(name), global_loader(global));
    }

    out.push('\n');
    for statement in &env.teardown {
        let _ = writeln!(out, "__folio.teardown.push(async () => {{\n  {}\n}});", statement);
    }
    out
}
