//! Nested parameter trees.
//!
//! A [`ParamTree`] is treated as a single flat vector for differentiation.
//! The flat order is deterministic: dict entries in key order, list entries
//! in index order, leaf elements in logical row-major order.

use std::collections::BTreeMap;

use ndarray::{ArrayD, IxDyn};

use crate::error::{Error, Result};
use crate::scalar::Scalar;

/// A nested container of arrays.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParamTree<T> {
    Leaf(ArrayD<T>),
    Dict(BTreeMap<String, ParamTree<T>>),
    List(Vec<ParamTree<T>>),
}

/// The shape of a [`ParamTree`] without its values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeDef {
    Leaf(Vec<usize>),
    Dict(BTreeMap<String, TreeDef>),
    List(Vec<TreeDef>),
}

impl TreeDef {
    /// Total number of scalar entries.
    pub fn num_params(&self) -> usize {
        match self {
            TreeDef::Leaf(shape) => shape.iter().product(),
            TreeDef::Dict(children) => children.values().map(TreeDef::num_params).sum(),
            TreeDef::List(children) => children.iter().map(TreeDef::num_params).sum(),
        }
    }

    /// Rebuild a tree from values in flat order.
    ///
    /// Fails with [`Error::StructureMismatch`] unless `values` holds exactly
    /// [`num_params`](Self::num_params) entries.
    pub fn unflatten<T: Clone>(&self, values: &[T]) -> Result<ParamTree<T>> {
        let expected = self.num_params();
        if values.len() != expected {
            return Err(Error::mismatch(
                "unflatten",
                format!("{expected} values"),
                format!("{} values", values.len()),
            ));
        }
        let mut rest = values;
        Ok(self.build(&mut rest))
    }

    fn build<T: Clone>(&self, rest: &mut &[T]) -> ParamTree<T> {
        match self {
            TreeDef::Leaf(shape) => {
                let n: usize = shape.iter().product();
                let (head, tail) = rest.split_at(n);
                *rest = tail;
                // Length is n by construction.
                let arr = ArrayD::from_shape_vec(IxDyn(shape), head.to_vec())
                    .unwrap_or_else(|_| unreachable!("leaf length matches its shape"));
                ParamTree::Leaf(arr)
            }
            TreeDef::Dict(children) => ParamTree::Dict(
                children
                    .iter()
                    .map(|(k, c)| (k.clone(), c.build(rest)))
                    .collect(),
            ),
            TreeDef::List(children) => {
                ParamTree::List(children.iter().map(|c| c.build(rest)).collect())
            }
        }
    }
}

impl<T> ParamTree<T> {
    /// Build a dict node from `(key, subtree)` pairs.
    pub fn dict<K: Into<String>>(entries: impl IntoIterator<Item = (K, ParamTree<T>)>) -> Self {
        ParamTree::Dict(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn structure(&self) -> TreeDef {
        match self {
            ParamTree::Leaf(a) => TreeDef::Leaf(a.shape().to_vec()),
            ParamTree::Dict(children) => TreeDef::Dict(
                children
                    .iter()
                    .map(|(k, c)| (k.clone(), c.structure()))
                    .collect(),
            ),
            ParamTree::List(children) => {
                TreeDef::List(children.iter().map(ParamTree::structure).collect())
            }
        }
    }

    /// Total number of scalar entries across all leaves.
    pub fn num_params(&self) -> usize {
        self.leaves().iter().map(|a| a.len()).sum()
    }

    /// Leaves in flat order.
    pub fn leaves(&self) -> Vec<&ArrayD<T>> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a ArrayD<T>>) {
        match self {
            ParamTree::Leaf(a) => out.push(a),
            ParamTree::Dict(children) => children.values().for_each(|c| c.collect_leaves(out)),
            ParamTree::List(children) => children.iter().for_each(|c| c.collect_leaves(out)),
        }
    }

    pub fn flatten(&self) -> Vec<T>
    where
        T: Clone,
    {
        let mut out = Vec::with_capacity(self.num_params());
        for leaf in self.leaves() {
            out.extend(leaf.iter().cloned());
        }
        out
    }

    /// Child of a dict node.
    pub fn get(&self, key: &str) -> Option<&ParamTree<T>> {
        match self {
            ParamTree::Dict(children) => children.get(key),
            _ => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&ArrayD<T>> {
        match self {
            ParamTree::Leaf(a) => Some(a),
            _ => None,
        }
    }

    /// The leaf stored under `key` of a dict node.
    ///
    /// Model code uses this to pick out named weights; a missing key or a
    /// non-leaf child is a [`Error::StructureMismatch`].
    pub fn leaf(&self, key: &str) -> Result<&ArrayD<T>> {
        self.get(key)
            .and_then(ParamTree::as_leaf)
            .ok_or_else(|| Error::mismatch("parameter lookup", format!("leaf `{key}`"), "nothing"))
    }

    /// Apply `f` to every scalar, keeping the structure.
    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> ParamTree<U> {
        self.map_inner(&mut f)
    }

    fn map_inner<U, G: FnMut(&T) -> U>(&self, f: &mut G) -> ParamTree<U> {
        match self {
            ParamTree::Leaf(a) => ParamTree::Leaf(a.map(|x| f(x))),
            ParamTree::Dict(children) => ParamTree::Dict(
                children
                    .iter()
                    .map(|(k, c)| (k.clone(), c.map_inner(f)))
                    .collect(),
            ),
            ParamTree::List(children) => {
                ParamTree::List(children.iter().map(|c| c.map_inner(f)).collect())
            }
        }
    }

    /// Combine two trees of identical structure element by element.
    ///
    /// Keys, list lengths and leaf shapes must all match, otherwise
    /// [`Error::StructureMismatch`] names the first differing path.
    pub fn zip_with<U, V>(
        &self,
        other: &ParamTree<U>,
        mut f: impl FnMut(&T, &U) -> V,
    ) -> Result<ParamTree<V>> {
        self.zip_inner(other, &mut f, "$")
    }

    fn zip_inner<U, V, G: FnMut(&T, &U) -> V>(
        &self,
        other: &ParamTree<U>,
        f: &mut G,
        path: &str,
    ) -> Result<ParamTree<V>> {
        match (self, other) {
            (ParamTree::Leaf(a), ParamTree::Leaf(b)) => {
                if a.shape() != b.shape() {
                    return Err(Error::mismatch(
                        path,
                        format!("leaf of shape {:?}", a.shape()),
                        format!("leaf of shape {:?}", b.shape()),
                    ));
                }
                Ok(ParamTree::Leaf(ndarray::Zip::from(a).and(b).map_collect(|x, y| f(x, y))))
            }
            (ParamTree::Dict(xs), ParamTree::Dict(ys)) => {
                if !xs.keys().eq(ys.keys()) {
                    return Err(Error::mismatch(
                        path,
                        format!("keys {:?}", xs.keys().collect::<Vec<_>>()),
                        format!("keys {:?}", ys.keys().collect::<Vec<_>>()),
                    ));
                }
                let mut out = BTreeMap::new();
                for ((k, x), y) in xs.iter().zip(ys.values()) {
                    out.insert(k.clone(), x.zip_inner(y, f, &format!("{path}.{k}"))?);
                }
                Ok(ParamTree::Dict(out))
            }
            (ParamTree::List(xs), ParamTree::List(ys)) => {
                if xs.len() != ys.len() {
                    return Err(Error::mismatch(
                        path,
                        format!("list of length {}", xs.len()),
                        format!("list of length {}", ys.len()),
                    ));
                }
                xs.iter()
                    .zip(ys)
                    .enumerate()
                    .map(|(i, (x, y))| x.zip_inner(y, f, &format!("{path}[{i}]")))
                    .collect::<Result<Vec<_>>>()
                    .map(ParamTree::List)
            }
            (a, b) => Err(Error::mismatch(path, a.kind(), b.kind())),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ParamTree::Leaf(_) => "leaf",
            ParamTree::Dict(_) => "dict",
            ParamTree::List(_) => "list",
        }
    }
}

impl<T: Scalar> ParamTree<T> {
    /// A tree of the same structure filled with zeros.
    pub fn zeros_like(&self) -> Self {
        self.map(|_| T::zero())
    }

    pub fn add(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, |&a, &b| a + b)
    }

    pub fn scale(&self, alpha: T) -> Self {
        self.map(|&a| alpha * a)
    }

    /// `self + alpha * x`.
    pub fn axpy(&self, alpha: T, x: &Self) -> Result<Self> {
        self.zip_with(x, |&a, &b| a + alpha * b)
    }

    /// Inner product over all entries.
    pub fn dot(&self, other: &Self) -> Result<T> {
        self.structure_matches(other)?;
        Ok(self
            .flatten()
            .into_iter()
            .zip(other.flatten())
            .fold(T::zero(), |acc, (a, b)| acc + a * b))
    }

    fn structure_matches(&self, other: &Self) -> Result<()> {
        self.zip_with(other, |_, _| ()).map(|_| ())
    }
}

impl<T> From<ArrayD<T>> for ParamTree<T> {
    fn from(a: ArrayD<T>) -> Self {
        ParamTree::Leaf(a)
    }
}
