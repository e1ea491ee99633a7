//! The Search operation: request construction, streaming of results, and
//! the [`SearchEntry`]/[`ResultEntry`] types entries are decoded into.

use std::collections::HashMap;
use std::marker::PhantomData;

use ber_codec::common::TagClass;
use ber_codec::structure::StructureTag;
use ber_codec::structures::{ASNTag, Boolean, Integer, OctetString, Sequence, Tag};

use crate::adapters::{Adapter, IntoAdapterVec};
use crate::controls::Control;
use crate::ldap::Ldap;
use crate::result::{LdapError, LdapResult, Result};

/// Base object scope for a Search operation (RFC 4511 section 4.5.1.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    Base = 0,
    OneLevel = 1,
    Subtree = 2,
}

/// How the server should dereference alias entries during a Search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DerefAliases {
    Never = 0,
    InSearching = 1,
    FindingBaseObj = 2,
    Always = 3,
}

/// Infrequently used Search parameters, set via
/// [`Ldap::with_search_options()`](crate::Ldap::with_search_options).
#[derive(Clone, Copy, Debug)]
pub struct SearchOptions {
    deref: DerefAliases,
    typesonly: bool,
    timelimit: i32,
    sizelimit: i32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            deref: DerefAliases::Never,
            typesonly: false,
            timelimit: 0,
            sizelimit: 0,
        }
    }
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deref(mut self, deref: DerefAliases) -> Self {
        self.deref = deref;
        self
    }

    pub fn typesonly(mut self, typesonly: bool) -> Self {
        self.typesonly = typesonly;
        self
    }

    pub fn timelimit(mut self, timelimit: i32) -> Self {
        self.timelimit = timelimit;
        self
    }

    pub fn sizelimit(mut self, sizelimit: i32) -> Self {
        self.sizelimit = sizelimit;
        self
    }
}

/// A single message belonging to a Search response stream, still in its
/// undecoded form: a SearchResultEntry, SearchResultReference, or
/// IntermediateResponse, with any response controls attached to it.
#[derive(Clone, Debug)]
pub struct ResultEntry(pub StructureTag, pub Vec<Control>);

impl ResultEntry {
    pub(crate) fn new(tag: StructureTag, ctrls: Vec<Control>) -> ResultEntry {
        ResultEntry(tag, ctrls)
    }

    /// True if this is an IntermediateResponse (RFC 4511 section 4.13).
    pub fn is_intermediate(&self) -> bool {
        self.0.id == 25
    }

    /// True if this is a SearchResultReference.
    pub fn is_ref(&self) -> bool {
        self.0.id == 19
    }
}

/// Extract the referral URLs out of a SearchResultReference.
pub fn parse_refs(tag: StructureTag) -> Vec<String> {
    tag.expect_constructed()
        .unwrap_or_default()
        .into_iter()
        .filter_map(|t| t.expect_primitive())
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .collect()
}

/// A decoded directory entry: its distinguished name and attributes.
///
/// Attribute values that aren't valid UTF-8 are kept in `bin_attrs`
/// instead of `attrs`, indexed by the same attribute name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchEntry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<String>>,
    pub bin_attrs: HashMap<String, Vec<Vec<u8>>>,
}

impl SearchEntry {
    /// Decode a SearchResultEntry into a [`SearchEntry`]. Panics if `re`
    /// is not a SearchResultEntry; callers should filter with
    /// [`ResultEntry::is_ref()`]/[`ResultEntry::is_intermediate()`] first.
    pub fn construct(re: ResultEntry) -> SearchEntry {
        let mut tags = re
            .0
            .expect_constructed()
            .expect("SearchResultEntry is constructed");
        let attr_vals = tags.pop().expect("partial attributes");
        let dn_tag = tags.pop().expect("object name");
        let dn = String::from_utf8(dn_tag.expect_primitive().expect("object name octets"))
            .expect("object name is UTF-8");
        let mut attrs = HashMap::new();
        let mut bin_attrs = HashMap::new();
        for pair in attr_vals.expect_constructed().unwrap_or_default() {
            let mut pair = pair.expect_constructed().expect("attribute pair").into_iter();
            let name = pair.next().expect("attribute name");
            let name = String::from_utf8(name.expect_primitive().expect("attribute name octets"))
                .expect("attribute name is UTF-8");
            let values = pair.next().expect("attribute values");
            let values = values.expect_constructed().unwrap_or_default();
            let mut text_vals = Vec::new();
            let mut bin_vals = Vec::new();
            let mut all_text = true;
            for v in values {
                let raw = v.expect_primitive().unwrap_or_default();
                match String::from_utf8(raw.clone()) {
                    Ok(s) => text_vals.push(s),
                    Err(_) => {
                        all_text = false;
                        bin_vals.push(raw);
                    }
                }
            }
            if all_text {
                attrs.insert(name, text_vals);
            } else {
                bin_vals.extend(text_vals.into_iter().map(String::into_bytes));
                bin_attrs.insert(name, bin_vals);
            }
        }
        SearchEntry {
            dn,
            attrs,
            bin_attrs,
        }
    }
}

fn search_request_tag<S, A>(
    base: &str,
    scope: Scope,
    deref: DerefAliases,
    typesonly: bool,
    timelimit: i32,
    sizelimit: i32,
    filter: &str,
    attrs: &A,
) -> Result<Tag>
where
    S: AsRef<str>,
    A: AsRef<[S]>,
{
    let filter_tag = crate::filter::parse(filter)
        .map_err(|_| LdapError::FilterParsing(filter.to_owned()))?;
    Ok(Tag::Sequence(Sequence {
        id: 3,
        class: TagClass::Application,
        inner: vec![
            Tag::OctetString(OctetString {
                inner: base.as_bytes().to_vec(),
                ..Default::default()
            }),
            Tag::Integer(Integer {
                inner: scope as i64,
                ..Default::default()
            }),
            Tag::Integer(Integer {
                inner: deref as i64,
                ..Default::default()
            }),
            Tag::Integer(Integer {
                inner: sizelimit as i64,
                ..Default::default()
            }),
            Tag::Integer(Integer {
                inner: timelimit as i64,
                ..Default::default()
            }),
            Tag::Boolean(Boolean {
                inner: typesonly,
                ..Default::default()
            }),
            filter_tag,
            Tag::Sequence(Sequence {
                inner: attrs
                    .as_ref()
                    .iter()
                    .map(|s| {
                        Tag::OctetString(OctetString {
                            inner: s.as_ref().as_bytes().to_vec(),
                            ..Default::default()
                        })
                    })
                    .collect(),
                ..Default::default()
            }),
        ],
    }))
}

/// A live handle to an in-progress Search's result stream.
///
/// Returned by [`Ldap::streaming_search()`]/[`Ldap::streaming_search_with()`];
/// drive it with [`next()`](Self::next) until it returns `Ok(None)`, then
/// call [`finish()`](Self::finish) for the overall [`LdapResult`].
pub struct SearchStream<'a, S, A> {
    pub(crate) ldap: Ldap,
    pub(crate) rx: Option<tokio::sync::mpsc::UnboundedReceiver<(StructureTag, Vec<Control>)>>,
    pub(crate) res: Option<LdapResult>,
    _marker: PhantomData<&'a (S, A)>,
}

impl<'a, S, A> SearchStream<'a, S, A>
where
    S: AsRef<str> + Send + Sync + 'a,
    A: AsRef<[S]> + Send + Sync + 'a,
{
    pub(crate) fn new(ldap: Ldap) -> Self {
        SearchStream {
            ldap,
            rx: None,
            res: None,
            _marker: PhantomData,
        }
    }

    /// Issue the underlying Search request.
    pub async fn start(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: A,
    ) -> Result<()> {
        let opts = self.ldap.search_opts.take().unwrap_or_default();
        let tag = search_request_tag(
            base,
            scope,
            opts.deref,
            opts.typesonly,
            opts.timelimit,
            opts.sizelimit,
            filter,
            &attrs,
        )?;
        let (_id, rx) = self.ldap.search_op(tag)?;
        self.rx = Some(rx);
        Ok(())
    }

    /// Return the next entry, reference, or intermediate response, or
    /// `Ok(None)` once SearchResultDone has been received.
    pub async fn next(&mut self) -> Result<Option<ResultEntry>> {
        let rx = self.rx.as_mut().expect("stream started");
        match rx.recv().await {
            None => Err(LdapError::ConnectionClosed),
            Some((tag, ctrls)) if tag.id == 5 => {
                let mut tags = tag
                    .expect_constructed()
                    .ok_or_else(|| LdapError::Decoding("SearchResultDone is not a SEQUENCE".into()))?;
                let mut res = crate::result::parse_ldap_result(&mut tags);
                res.ctrls = ctrls;
                self.res = Some(res);
                Ok(None)
            }
            Some((tag, ctrls)) => Ok(Some(ResultEntry::new(tag, ctrls))),
        }
    }

    /// Consume the stream's accumulated result. Must be called after
    /// `next()` has returned `Ok(None)`.
    pub async fn finish(&mut self) -> LdapResult {
        self.res.take().unwrap_or_default()
    }

    /// Access the underlying `Ldap` handle, e.g. to clone it for a
    /// follow-up operation from within an adapter.
    pub fn ldap_handle(&self) -> &Ldap {
        &self.ldap
    }
}

impl Ldap {
    /// Perform a Search, returning every result entry and the overall
    /// [`LdapResult`] once the search is done. Referrals and intermediate
    /// responses are silently skipped; use
    /// [`streaming_search()`](Self::streaming_search) to see them.
    pub async fn search<S, A>(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: A,
    ) -> Result<(Vec<ResultEntry>, LdapResult)>
    where
        S: AsRef<str> + Send + Sync,
        A: AsRef<[S]> + Send + Sync,
    {
        let mut stream = self.streaming_search(base, scope, filter, attrs).await?;
        let mut entries = Vec::new();
        while let Some(entry) = stream.next().await? {
            entries.push(entry);
        }
        Ok((entries, stream.finish().await))
    }

    /// Perform a Search, returning a [`SearchStream`] that must be driven
    /// with repeated calls to `next()`.
    pub async fn streaming_search<'a, S, A>(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: A,
    ) -> Result<SearchStream<'a, S, A>>
    where
        S: AsRef<str> + Send + Sync + 'a,
        A: AsRef<[S]> + Send + Sync + 'a,
    {
        let mut stream = SearchStream::new(self.clone());
        stream.start(base, scope, filter, attrs).await?;
        Ok(stream)
    }

    /// Like [`streaming_search()`](Self::streaming_search), routed through
    /// one or more [`Adapter`]s that can transform, filter, or extend the
    /// stream of results (e.g. [`crate::adapters::PagedResults`]).
    pub async fn streaming_search_with<'a, Ad, S, A>(
        &mut self,
        adapters: Ad,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: A,
    ) -> Result<AdaptedStream<'a, S, A>>
    where
        Ad: IntoAdapterVec<'a, S, A>,
        S: AsRef<str> + Send + Sync + 'a,
        A: AsRef<[S]> + Send + Sync + 'a,
    {
        let mut adapters = IntoAdapterVec::into(adapters);
        let mut stream = SearchStream::new(self.clone());
        if adapters.is_empty() {
            stream.start(base, scope, filter, attrs).await?;
        } else {
            adapters[0].start(&mut stream, base, scope, filter, attrs).await?;
        }
        Ok(AdaptedStream { stream, adapters })
    }
}

/// A [`SearchStream`] wrapped by a chain of [`Adapter`]s.
pub struct AdaptedStream<'a, S, A> {
    stream: SearchStream<'a, S, A>,
    adapters: Vec<Box<dyn Adapter<'a, S, A> + 'a>>,
}

impl<'a, S, A> AdaptedStream<'a, S, A>
where
    S: AsRef<str> + Send + Sync + 'a,
    A: AsRef<[S]> + Send + Sync + 'a,
{
    pub async fn next(&mut self) -> Result<Option<ResultEntry>> {
        match self.adapters.first_mut() {
            Some(first) => first.next(&mut self.stream).await,
            None => self.stream.next().await,
        }
    }

    pub async fn finish(&mut self) -> LdapResult {
        match self.adapters.first_mut() {
            Some(first) => first.finish(&mut self.stream).await,
            None => self.stream.finish().await,
        }
    }
}
